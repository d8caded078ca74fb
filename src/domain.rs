//! Domain module - Core business logic and entities
//!
//! This module contains the media records, the identity rules used to detect
//! duplicates, the selection session state machine, and the traits that the
//! infrastructure layer implements.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod canonical_locator;
pub mod content_surface;
pub mod media_record;
pub mod repositories;
pub mod resolution;
pub mod selection_session;

// Re-export commonly used items for convenience
pub use canonical_locator::CanonicalLocator;
pub use content_surface::{ContentBridge, SurfaceClassifier, SurfaceKind};
pub use media_record::{
    BatchLabel, ImageBatch, ImageKey, ImageRecord, MissingLabel, ScrapedVideo, VideoRecord,
    parse_view_count,
};
pub use repositories::{
    ImageInsertOutcome, LibraryStatistics, MediaRecordStore, StoreError, UpsertMode, UpsertOutcome,
};
pub use resolution::{
    FieldSource, ImageDecision, MergeField, MergeFieldError, MergeSelection, SaveAction,
    VideoDecision,
};
pub use selection_session::{
    SelectionSession, SessionGeneration, SessionMode, SessionTransitionError,
};
