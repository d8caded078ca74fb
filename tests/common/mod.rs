//! Shared fixtures for the integration tests: a simulated gallery page served
//! over the channel bridge, a scripted decision source and a call-counting store.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use media_harvest_lib::application::{DecisionSource, LabelInput, SessionOrchestrator};
use media_harvest_lib::domain::{
    CanonicalLocator, ImageBatch, ImageInsertOutcome, ImageKey, ImageRecord, ImageDecision,
    LibraryStatistics, MediaRecordStore, StoreError, UpsertMode, UpsertOutcome, VideoDecision,
    VideoRecord,
};
use media_harvest_lib::infrastructure::{
    ChannelBridge, MediaLibrary, SelectionSurface, SessionConfig, SurfaceConfig, serve_surface,
};

pub const GALLERY: &str = "https://media.example/browse/images?page=1#top";
pub const VIDEO_PAGE: &str = "https://media.example/videos/42";

/// Page-side state of an image gallery: what the user clicked while the
/// selection capability was installed.
#[derive(Default)]
pub struct SimulatedGallery {
    installed: Mutex<bool>,
    clicked: Mutex<Vec<String>>,
    refuse_install: bool,
    pub installs: AtomicUsize,
    pub clears: AtomicUsize,
}

impl SimulatedGallery {
    pub fn refusing_install() -> Self {
        Self {
            refuse_install: true,
            ..Self::default()
        }
    }

    /// Toggle an image the way a click on the page would.
    pub fn click(&self, image: &str) {
        if !*self.installed.lock().unwrap() {
            return;
        }
        let mut clicked = self.clicked.lock().unwrap();
        if let Some(position) = clicked.iter().position(|c| c == image) {
            clicked.remove(position);
        } else {
            clicked.push(image.to_string());
        }
    }

    pub fn is_installed(&self) -> bool {
        *self.installed.lock().unwrap()
    }
}

impl SelectionSurface for SimulatedGallery {
    fn inject(&self) -> bool {
        self.installs.fetch_add(1, Ordering::SeqCst);
        if self.refuse_install {
            return false;
        }
        *self.installed.lock().unwrap() = true;
        true
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.installed.lock().unwrap() = false;
        self.clicked.lock().unwrap().clear();
    }

    fn selection(&self) -> Vec<String> {
        if self.is_installed() {
            self.clicked.lock().unwrap().clone()
        } else {
            Vec::new()
        }
    }
}

/// Decision source answering from queued replies; an empty queue dismisses.
#[derive(Default)]
pub struct ScriptedDecisions {
    labels: Mutex<VecDeque<Option<LabelInput>>>,
    images: Mutex<VecDeque<ImageDecision>>,
    videos: Mutex<VecDeque<VideoDecision>>,
    pub image_prompts: AtomicUsize,
    pub video_prompts: AtomicUsize,
}

impl ScriptedDecisions {
    pub fn label(&self, label: &str) -> &Self {
        self.labels
            .lock()
            .unwrap()
            .push_back(Some(LabelInput::new(label, None)));
        self
    }

    pub fn dismiss_label(&self) -> &Self {
        self.labels.lock().unwrap().push_back(None);
        self
    }

    pub fn image_decision(&self, decision: ImageDecision) -> &Self {
        self.images.lock().unwrap().push_back(decision);
        self
    }

    pub fn video_decision(&self, decision: VideoDecision) -> &Self {
        self.videos.lock().unwrap().push_back(decision);
        self
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn decide_video(&self, _existing: &VideoRecord, _candidate: &VideoRecord) -> VideoDecision {
        self.video_prompts.fetch_add(1, Ordering::SeqCst);
        self.videos
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(VideoDecision::Dismiss)
    }

    async fn describe_images(&self, _selected: usize) -> Option<LabelInput> {
        self.labels.lock().unwrap().pop_front().flatten()
    }

    async fn decide_images(&self, _batch: &ImageBatch, _duplicates: &[ImageRecord]) -> ImageDecision {
        self.image_prompts.fetch_add(1, Ordering::SeqCst);
        self.images
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ImageDecision::Dismiss)
    }
}

/// Store wrapper counting every call that reaches the inner store.
pub struct CountingStore {
    inner: Arc<dyn MediaRecordStore>,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn MediaRecordStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaRecordStore for CountingStore {
    async fn find_video_by_locator(
        &self,
        locator: &CanonicalLocator,
    ) -> Result<Option<VideoRecord>, StoreError> {
        self.tick();
        self.inner.find_video_by_locator(locator).await
    }

    async fn upsert_video(
        &self,
        record: &VideoRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome, StoreError> {
        self.tick();
        self.inner.upsert_video(record, mode).await
    }

    async fn find_images_by_keys(&self, keys: &[ImageKey]) -> Result<Vec<ImageRecord>, StoreError> {
        self.tick();
        self.inner.find_images_by_keys(keys).await
    }

    async fn insert_images_ignoring_duplicates(
        &self,
        records: &[ImageRecord],
    ) -> Result<ImageInsertOutcome, StoreError> {
        self.tick();
        self.inner.insert_images_ignoring_duplicates(records).await
    }

    async fn list_distinct_playlist_labels(&self) -> Result<Vec<String>, StoreError> {
        self.tick();
        self.inner.list_distinct_playlist_labels().await
    }

    async fn statistics(&self) -> Result<LibraryStatistics, StoreError> {
        self.tick();
        self.inner.statistics().await
    }
}

/// Orchestrator wired to a simulated gallery through the channel bridge.
pub struct Harness {
    pub orchestrator: SessionOrchestrator,
    pub gallery: Arc<SimulatedGallery>,
    pub decisions: Arc<ScriptedDecisions>,
    pub library: Arc<MediaLibrary>,
    pub store: Arc<CountingStore>,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(SimulatedGallery::default(), true).await
    }

    pub async fn unconfigured() -> Self {
        Self::build(SimulatedGallery::default(), false).await
    }

    pub async fn with_gallery(gallery: SimulatedGallery) -> Self {
        Self::build(gallery, true).await
    }

    async fn build(gallery: SimulatedGallery, configured: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let library = if configured {
            MediaLibrary::open(&dir.path().join("library.db")).await.unwrap()
        } else {
            MediaLibrary::unconfigured()
        };
        let library = Arc::new(library);
        let store = Arc::new(CountingStore::new(library.clone()));

        let session = SessionConfig {
            poll_interval_ms: 10,
            bridge_timeout_ms: 1_000,
            ..SessionConfig::default()
        };
        let gallery = Arc::new(gallery);
        let (bridge, receiver) = ChannelBridge::from_config(&session);
        tokio::spawn(serve_surface(receiver, gallery.clone()));

        let decisions = Arc::new(ScriptedDecisions::default());
        let orchestrator = SessionOrchestrator::new(
            Arc::new(bridge),
            store.clone(),
            decisions.clone(),
            &session,
            &SurfaceConfig::default(),
        );

        Self {
            orchestrator,
            gallery,
            decisions,
            library,
            store,
            _dir: dir,
        }
    }

    /// Navigate to the gallery and start marking.
    pub async fn start_marking(&self) {
        self.orchestrator.navigate(GALLERY).await;
        let status = self.orchestrator.begin_mark().await;
        assert_eq!(status.to_string(), "Click images to select them, then save");
    }
}
