//! Content surface contract
//!
//! The rendered page lives in an isolated, script-executable context. The host
//! only reaches it through the asynchronous calls of [`ContentBridge`] and only
//! decides what to do with a page through [`SurfaceClassifier`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use url::Url;

/// Request/response operations the host may issue against the surface.
///
/// Every operation has a defined fallback value. Implementations log transport
/// failures instead of returning them.
#[async_trait]
pub trait ContentBridge: Send + Sync {
    /// Install the marking capability. Idempotent; `false` when it could not be installed.
    async fn inject(&self) -> bool;

    /// Remove the capability and every visual mark. Best effort.
    async fn clear(&self);

    /// Raw member locators currently marked. Empty when none or when not injected.
    async fn read_selection(&self) -> Vec<String>;

    /// Cheap count of marked members, used for display polling.
    async fn read_selection_count(&self) -> usize;
}

/// Kind of page the surface is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SurfaceKind {
    VideoPage,
    ImageGallery,
    Ineligible,
}

impl SurfaceKind {
    /// Only image galleries support a marking session.
    pub const fn supports_marking(self) -> bool {
        matches!(self, Self::ImageGallery)
    }
}

/// Classifies page locators by path markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceClassifier {
    video_marker: String,
    image_marker: String,
}

impl SurfaceClassifier {
    pub fn new(video_marker: impl Into<String>, image_marker: impl Into<String>) -> Self {
        Self {
            video_marker: video_marker.into().to_lowercase(),
            image_marker: image_marker.into().to_lowercase(),
        }
    }

    pub fn classify(&self, raw_locator: &str) -> SurfaceKind {
        // Relative or malformed locators are matched as plain text.
        let path = Url::parse(raw_locator)
            .map(|url| url.path().to_lowercase())
            .unwrap_or_else(|_| raw_locator.to_lowercase());

        if !self.image_marker.is_empty() && path.contains(&self.image_marker) {
            SurfaceKind::ImageGallery
        } else if !self.video_marker.is_empty() && path.contains(&self.video_marker) {
            SurfaceKind::VideoPage
        } else {
            SurfaceKind::Ineligible
        }
    }
}
