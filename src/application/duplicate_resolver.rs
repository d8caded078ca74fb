//! Duplicate detection and resolution
//!
//! Every save goes `CHECKING -> NO_COLLISION -> written` or
//! `CHECKING -> COLLISION -> awaiting decision -> resolved`. The store's unique
//! keys are the final word: an insert that races another writer and hits the
//! key is replayed as an update, so one canonical locator never yields two rows.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::decision_source::DecisionSource;
use crate::domain::media_record::{ImageBatch, ImageKey, ImageRecord, VideoRecord};
use crate::domain::repositories::{MediaRecordStore, StoreError, UpsertMode};
use crate::domain::resolution::{ImageDecision, SaveAction, VideoDecision};

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("record locator is empty")]
    EmptyLocator,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResolutionError {
    pub const fn is_not_configured(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotConfigured))
    }
}

/// Result of the lookup phase of a video save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoCheck {
    NoCollision,
    Collision(Box<VideoRecord>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VideoSaveOutcome {
    pub action: SaveAction,
    /// Record as stored after the save, `None` when nothing was written.
    pub stored: Option<VideoRecord>,
    pub collided: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImageSaveOutcome {
    pub saved: usize,
    pub skipped: usize,
    /// Members whose key was already stored before the save.
    pub duplicates: usize,
    /// Decision taken, `None` when the batch had no duplicates.
    pub decision: Option<ImageDecision>,
}

impl ImageSaveOutcome {
    pub fn dismissed(&self) -> bool {
        self.decision == Some(ImageDecision::Dismiss)
    }
}

#[derive(Clone)]
pub struct DuplicateResolver {
    store: Arc<dyn MediaRecordStore>,
}

impl DuplicateResolver {
    pub fn new(store: Arc<dyn MediaRecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MediaRecordStore> {
        &self.store
    }

    // ===============================
    // VIDEO PROTOCOL
    // ===============================

    pub async fn check_video(&self, candidate: &VideoRecord) -> Result<VideoCheck, ResolutionError> {
        if candidate.locator.is_empty() {
            return Err(ResolutionError::EmptyLocator);
        }
        Ok(match self.store.find_video_by_locator(&candidate.locator).await? {
            Some(existing) => VideoCheck::Collision(Box::new(existing)),
            None => VideoCheck::NoCollision,
        })
    }

    /// Save `candidate`, consulting `decisions` only when it collides.
    pub async fn save_video(
        &self,
        candidate: VideoRecord,
        decisions: &dyn DecisionSource,
    ) -> Result<VideoSaveOutcome, ResolutionError> {
        match self.check_video(&candidate).await? {
            VideoCheck::NoCollision => {
                let action = self.insert_or_update(&candidate).await?;
                info!("🎬 Saved video {} ({})", candidate.locator, action);
                if action == SaveAction::Inserted {
                    return Ok(VideoSaveOutcome {
                        action,
                        stored: Some(candidate),
                        collided: false,
                    });
                }
                // Lost an insert race: the row keeps its original creation time.
                let stored = self.store.find_video_by_locator(&candidate.locator).await?;
                Ok(VideoSaveOutcome {
                    action,
                    stored: stored.or(Some(candidate)),
                    collided: true,
                })
            }
            VideoCheck::Collision(existing) => {
                debug!("Video {} already stored; awaiting decision", candidate.locator);
                let decision = decisions.decide_video(&existing, &candidate).await;
                self.apply_video_decision(&existing, candidate, decision).await
            }
        }
    }

    pub async fn apply_video_decision(
        &self,
        existing: &VideoRecord,
        candidate: VideoRecord,
        decision: VideoDecision,
    ) -> Result<VideoSaveOutcome, ResolutionError> {
        let now = Utc::now();
        let resolved = match decision {
            VideoDecision::KeepExisting => {
                return Ok(VideoSaveOutcome {
                    action: SaveAction::KeptExisting,
                    stored: Some(existing.clone()),
                    collided: true,
                });
            }
            VideoDecision::Dismiss => {
                return Ok(VideoSaveOutcome {
                    action: SaveAction::Dismissed,
                    stored: None,
                    collided: true,
                });
            }
            VideoDecision::OverwriteWithNew => existing.overwritten_by(&candidate, now),
            VideoDecision::FieldMerge { selection } => selection.apply(existing, &candidate, now),
        };

        self.write_update(&resolved).await?;
        info!("🎬 Updated video {} after collision", resolved.locator);
        Ok(VideoSaveOutcome {
            action: SaveAction::Updated,
            stored: Some(resolved),
            collided: true,
        })
    }

    async fn insert_or_update(&self, record: &VideoRecord) -> Result<SaveAction, ResolutionError> {
        match self.store.upsert_video(record, UpsertMode::Insert).await {
            Ok(outcome) => Ok(outcome.action),
            Err(StoreError::ConstraintViolation { key }) => {
                warn!("Insert of {} hit an existing row; retrying as update", key);
                let outcome = self.store.upsert_video(record, UpsertMode::Update).await?;
                Ok(outcome.action)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_update(&self, record: &VideoRecord) -> Result<(), ResolutionError> {
        let outcome = self.store.upsert_video(record, UpsertMode::Update).await?;
        if outcome.rows_affected == 0 {
            // Row vanished between lookup and write.
            warn!("Update of {} touched no rows; inserting instead", record.locator);
            self.insert_or_update(record).await?;
        }
        Ok(())
    }

    // ===============================
    // IMAGE PROTOCOL
    // ===============================

    pub async fn find_image_duplicates(
        &self,
        batch: &ImageBatch,
    ) -> Result<Vec<ImageRecord>, ResolutionError> {
        if batch.owner_locator().is_empty() {
            return Err(ResolutionError::EmptyLocator);
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.find_images_by_keys(&batch.keys()).await?)
    }

    /// Save `batch`, consulting `decisions` only when some members are stored.
    pub async fn save_images(
        &self,
        batch: &ImageBatch,
        decisions: &dyn DecisionSource,
    ) -> Result<ImageSaveOutcome, ResolutionError> {
        let duplicates = self.find_image_duplicates(batch).await?;
        if duplicates.is_empty() {
            return self.insert_new_images(batch).await;
        }

        debug!(
            "{} of {} images already stored; awaiting decision",
            duplicates.len(),
            batch.len()
        );
        let decision = decisions.decide_images(batch, &duplicates).await;
        self.apply_image_decision(batch, &duplicates, decision).await
    }

    /// Write a batch whose lookup found no stored members.
    pub async fn insert_new_images(
        &self,
        batch: &ImageBatch,
    ) -> Result<ImageSaveOutcome, ResolutionError> {
        let written = self
            .store
            .insert_images_ignoring_duplicates(&batch.records(Utc::now()))
            .await?;
        info!(
            "🖼️ Saved {} images for {} ({} skipped)",
            written.saved,
            batch.owner_locator(),
            written.skipped
        );
        Ok(ImageSaveOutcome {
            saved: written.saved,
            skipped: written.skipped,
            duplicates: 0,
            decision: None,
        })
    }

    pub async fn apply_image_decision(
        &self,
        batch: &ImageBatch,
        duplicates: &[ImageRecord],
        decision: ImageDecision,
    ) -> Result<ImageSaveOutcome, ResolutionError> {
        let now = Utc::now();
        let existing: HashSet<ImageKey> = duplicates.iter().map(ImageRecord::key).collect();
        let duplicate_count = batch
            .members()
            .iter()
            .filter(|m| existing.contains(&batch.key_for(m)))
            .count();

        let (saved, skipped) = match decision {
            ImageDecision::Dismiss => (0, 0),
            ImageDecision::SaveNewOnly => {
                let fresh: Vec<ImageRecord> = batch
                    .members()
                    .iter()
                    .filter(|m| !existing.contains(&batch.key_for(m)))
                    .map(|m| batch.record_for(m, now))
                    .collect();
                if fresh.is_empty() {
                    (0, duplicate_count)
                } else {
                    let written = self.store.insert_images_ignoring_duplicates(&fresh).await?;
                    (written.saved, duplicate_count + written.skipped)
                }
            }
            ImageDecision::SaveAll => {
                let written = self
                    .store
                    .insert_images_ignoring_duplicates(&batch.records(now))
                    .await?;
                (written.saved, written.skipped)
            }
        };

        info!(
            "🖼️ Image batch for {} resolved with {:?}: {} saved, {} skipped",
            batch.owner_locator(),
            decision,
            saved,
            skipped
        );
        Ok(ImageSaveOutcome {
            saved,
            skipped,
            duplicates: duplicate_count,
            decision: Some(decision),
        })
    }
}
