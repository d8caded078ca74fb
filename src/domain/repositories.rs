//! Repository traits for the media library
//!
//! Storage-agnostic contract used by the duplicate resolver. The SQLite
//! implementation lives in `infrastructure::media_repository`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use super::canonical_locator::CanonicalLocator;
use super::media_record::{ImageKey, ImageRecord, VideoRecord};
use super::resolution::SaveAction;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No database path has been configured yet.
    #[error("media library is not configured")]
    NotConfigured,

    #[error("a record already exists for '{key}'")]
    ConstraintViolation { key: String },

    #[error("refusing to store a record with an empty locator")]
    EmptyLocator,

    #[error("storage I/O failure: {0}")]
    Io(#[from] sqlx::Error),

    #[error("stored record is malformed: {0}")]
    Malformed(String),
}

impl StoreError {
    pub const fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured)
    }
}

/// Whether `upsert_video` creates a row or rewrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    Insert,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub action: SaveAction,
    pub rows_affected: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImageInsertOutcome {
    pub saved: usize,
    pub skipped: usize,
}

/// 라이브러리 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LibraryStatistics {
    pub total_videos: u64,
    pub total_images: u64,
    pub total_playlists: u64,
    pub database_size_bytes: u64,
}

/// Durable keyed storage for video and image records.
#[async_trait]
pub trait MediaRecordStore: Send + Sync {
    async fn find_video_by_locator(
        &self,
        locator: &CanonicalLocator,
    ) -> Result<Option<VideoRecord>, StoreError>;

    /// `Insert` fails with [`StoreError::ConstraintViolation`] when the locator is taken.
    async fn upsert_video(
        &self,
        record: &VideoRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn find_images_by_keys(&self, keys: &[ImageKey]) -> Result<Vec<ImageRecord>, StoreError>;

    /// Rows whose key already exists are left untouched and counted as skipped,
    /// as are rows whose individual write fails.
    async fn insert_images_ignoring_duplicates(
        &self,
        records: &[ImageRecord],
    ) -> Result<ImageInsertOutcome, StoreError>;

    async fn list_distinct_playlist_labels(&self) -> Result<Vec<String>, StoreError>;

    async fn statistics(&self) -> Result<LibraryStatistics, StoreError>;
}
