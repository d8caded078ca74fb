//! User-visible status messages
//!
//! Every gesture ends in exactly one message; the UI shows it as a snackbar.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::domain::resolution::SaveAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum StatusMessage {
    MarkingStarted,
    AlreadyMarking,
    DecisionPending,
    InjectionFailed,
    NotOnImageGallery,
    NotMarking,
    NothingSelected,
    LabelRequired,
    SaveCancelled,
    SelectionCancelled,
    SelectionAbandoned,
    ImagesSaved { saved: usize, skipped: usize },
    NoNewImages { skipped: usize },
    VideoInserted,
    VideoUpdated,
    VideoKept,
    VideoDismissed,
    NotConfigured { action: String },
    SaveFailed { reason: String },
}

impl StatusMessage {
    pub const fn from_video_action(action: SaveAction) -> Self {
        match action {
            SaveAction::Inserted => Self::VideoInserted,
            SaveAction::Updated => Self::VideoUpdated,
            SaveAction::KeptExisting => Self::VideoKept,
            SaveAction::Dismissed => Self::VideoDismissed,
        }
    }

    pub fn not_configured(action: &str) -> Self {
        Self::NotConfigured {
            action: action.to_string(),
        }
    }

    pub fn save_failed(reason: impl fmt::Display) -> Self {
        Self::SaveFailed {
            reason: reason.to_string(),
        }
    }

    /// Failures the user has to act on, as opposed to informational notices.
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::InjectionFailed
                | Self::LabelRequired
                | Self::NotConfigured { .. }
                | Self::SaveFailed { .. }
        )
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkingStarted => f.write_str("Click images to select them, then save"),
            Self::AlreadyMarking => f.write_str("Image selection is already active"),
            Self::DecisionPending => f.write_str("Finish the pending save first"),
            Self::InjectionFailed => f.write_str("Failed to setup image selection"),
            Self::NotOnImageGallery => f.write_str("Image selection only works on image pages"),
            Self::NotMarking => f.write_str("Image selection is not active"),
            Self::NothingSelected => {
                f.write_str("No images selected. Please select some images first.")
            }
            Self::LabelRequired => f.write_str("Tag is required!"),
            Self::SaveCancelled => f.write_str("Save cancelled"),
            Self::SelectionCancelled => f.write_str("Image selection cancelled"),
            Self::SelectionAbandoned => f.write_str("Image selection ended because the page changed"),
            Self::ImagesSaved { saved, skipped: 0 } => write!(f, "Saved {} images", saved),
            Self::ImagesSaved { saved, skipped } => {
                write!(f, "Saved {} images, {} duplicates skipped", saved, skipped)
            }
            Self::NoNewImages { skipped } => {
                write!(f, "No new images to save! ({} duplicates skipped)", skipped)
            }
            Self::VideoInserted => f.write_str("Video saved successfully!"),
            Self::VideoUpdated => f.write_str("Video updated successfully!"),
            Self::VideoKept => f.write_str("Kept existing video data"),
            Self::VideoDismissed => f.write_str("Video was not saved"),
            Self::NotConfigured { action } => {
                write!(f, "Please set up a database location before {}", action)
            }
            Self::SaveFailed { reason } => write!(f, "Failed to save: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_all_reports_skipped_not_updated() {
        let message = StatusMessage::ImagesSaved { saved: 0, skipped: 3 };
        let text = message.to_string();
        assert!(text.contains("3 duplicates skipped"));
        assert!(!text.contains("updated"));
    }

    #[test]
    fn test_video_actions_map_to_messages() {
        assert_eq!(
            StatusMessage::from_video_action(SaveAction::Updated).to_string(),
            "Video updated successfully!"
        );
        assert_eq!(
            StatusMessage::from_video_action(SaveAction::KeptExisting),
            StatusMessage::VideoKept
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(StatusMessage::not_configured("saving images").is_error());
        assert!(StatusMessage::LabelRequired.is_error());
        assert!(!StatusMessage::NothingSelected.is_error());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(StatusMessage::ImagesSaved { saved: 2, skipped: 1 }).unwrap();
        assert_eq!(json["kind"], "images_saved");
        assert_eq!(json["saved"], 2);
    }
}
