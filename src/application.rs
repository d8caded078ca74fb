//! Application layer
//!
//! Use cases that compose the domain with a record store, a content bridge
//! and a decision source.

pub mod decision_source;
pub mod duplicate_resolver;
pub mod session_orchestrator;
pub mod status;

pub use decision_source::{ChannelDecisionSource, DecisionPrompt, DecisionSource, LabelInput};
pub use duplicate_resolver::{
    DuplicateResolver, ImageSaveOutcome, ResolutionError, VideoCheck, VideoSaveOutcome,
};
pub use session_orchestrator::{SessionOrchestrator, SessionSnapshot};
pub use status::StatusMessage;
