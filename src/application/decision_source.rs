//! Decision sources for duplicate resolution
//!
//! The resolver never prompts anyone itself. It asks a [`DecisionSource`] and
//! waits for that single answer; other saves are not blocked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use ts_rs::TS;

use crate::domain::media_record::{ImageBatch, ImageRecord, VideoRecord};
use crate::domain::resolution::{ImageDecision, VideoDecision};
use crate::infrastructure::config::SessionConfig;

/// Label and comments typed by the user before an image batch is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LabelInput {
    pub label: String,
    pub comments: Option<String>,
}

impl LabelInput {
    pub fn new(label: impl Into<String>, comments: Option<&str>) -> Self {
        Self {
            label: label.into(),
            comments: comments.map(ToString::to_string),
        }
    }
}

#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Resolve a video save that hit a stored record.
    async fn decide_video(&self, existing: &VideoRecord, candidate: &VideoRecord) -> VideoDecision;

    /// Ask for the label of a batch of `selected` images. `None` dismisses the save.
    async fn describe_images(&self, selected: usize) -> Option<LabelInput>;

    /// Resolve a batch in which `duplicates` are already stored.
    async fn decide_images(&self, batch: &ImageBatch, duplicates: &[ImageRecord]) -> ImageDecision;
}

/// Prompt delivered to whoever answers decisions (normally the UI layer).
#[derive(Debug)]
pub enum DecisionPrompt {
    VideoCollision {
        existing: VideoRecord,
        candidate: VideoRecord,
        reply: oneshot::Sender<VideoDecision>,
    },
    ImageLabel {
        selected: usize,
        reply: oneshot::Sender<Option<LabelInput>>,
    },
    ImageDuplicates {
        batch: ImageBatch,
        duplicates: Vec<ImageRecord>,
        reply: oneshot::Sender<ImageDecision>,
    },
}

/// Decision source that forwards prompts over a channel.
///
/// A prompt that cannot be delivered, or whose reply slot is dropped, counts
/// as a dismissal so nothing is written without an answer.
#[derive(Debug, Clone)]
pub struct ChannelDecisionSource {
    prompts: mpsc::Sender<DecisionPrompt>,
}

impl ChannelDecisionSource {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<DecisionPrompt>) {
        let (prompts, receiver) = mpsc::channel(buffer.max(1));
        (Self { prompts }, receiver)
    }

    pub fn from_config(config: &SessionConfig) -> (Self, mpsc::Receiver<DecisionPrompt>) {
        Self::new(config.decision_buffer_size)
    }

    async fn ask<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> DecisionPrompt) -> Option<T> {
        let (reply, answer) = oneshot::channel();
        if self.prompts.send(build(reply)).await.is_err() {
            warn!("No one is listening for decision prompts");
            return None;
        }
        answer.await.ok()
    }
}

#[async_trait]
impl DecisionSource for ChannelDecisionSource {
    async fn decide_video(&self, existing: &VideoRecord, candidate: &VideoRecord) -> VideoDecision {
        self.ask(|reply| DecisionPrompt::VideoCollision {
            existing: existing.clone(),
            candidate: candidate.clone(),
            reply,
        })
        .await
        .unwrap_or(VideoDecision::Dismiss)
    }

    async fn describe_images(&self, selected: usize) -> Option<LabelInput> {
        self.ask(|reply| DecisionPrompt::ImageLabel { selected, reply })
            .await
            .flatten()
    }

    async fn decide_images(&self, batch: &ImageBatch, duplicates: &[ImageRecord]) -> ImageDecision {
        self.ask(|reply| DecisionPrompt::ImageDuplicates {
            batch: batch.clone(),
            duplicates: duplicates.to_vec(),
            reply,
        })
        .await
        .unwrap_or(ImageDecision::Dismiss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_video;

    #[tokio::test]
    async fn test_prompt_is_answered_through_channel() {
        let (source, mut prompts) = ChannelDecisionSource::from_config(&SessionConfig::default());
        tokio::spawn(async move {
            while let Some(prompt) = prompts.recv().await {
                match prompt {
                    DecisionPrompt::VideoCollision { existing, reply, .. } => {
                        assert_eq!(existing.title.as_deref(), Some("Old"));
                        let _ = reply.send(VideoDecision::OverwriteWithNew);
                    }
                    DecisionPrompt::ImageLabel { selected, reply } => {
                        let _ = reply.send(Some(LabelInput::new(format!("batch-{}", selected), None)));
                    }
                    DecisionPrompt::ImageDuplicates { reply, .. } => {
                        let _ = reply.send(ImageDecision::SaveAll);
                    }
                }
            }
        });

        let existing = sample_video("site/v/1", "Old");
        let candidate = sample_video("site/v/1", "New");
        assert_eq!(
            source.decide_video(&existing, &candidate).await,
            VideoDecision::OverwriteWithNew
        );
        assert_eq!(
            source.describe_images(3).await,
            Some(LabelInput::new("batch-3", None))
        );
    }

    #[tokio::test]
    async fn test_dropped_prompt_is_dismissal() {
        let (source, mut prompts) = ChannelDecisionSource::new(1);
        tokio::spawn(async move {
            while let Some(prompt) = prompts.recv().await {
                drop(prompt);
            }
        });

        let record = sample_video("site/v/1", "Old");
        assert_eq!(source.decide_video(&record, &record).await, VideoDecision::Dismiss);
        assert_eq!(source.describe_images(2).await, None);
    }

    #[tokio::test]
    async fn test_missing_listener_is_dismissal() {
        let (source, prompts) = ChannelDecisionSource::new(1);
        drop(prompts);
        let record = sample_video("site/v/1", "Old");
        assert_eq!(source.decide_video(&record, &record).await, VideoDecision::Dismiss);
    }
}
