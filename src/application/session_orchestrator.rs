//! Selection session orchestration
//!
//! Composes the session state machine, the content bridge, the duplicate
//! resolver and the decision source into the user gestures: begin marking,
//! commit, cancel, and navigation.
//!
//! Session state sits behind a short-held lock that is never kept across a
//! bridge call or a decision round-trip. Gestures arriving in the wrong phase
//! return immediately with a status message instead of queueing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use super::decision_source::DecisionSource;
use super::duplicate_resolver::{DuplicateResolver, ImageSaveOutcome, ResolutionError};
use super::status::StatusMessage;
use crate::domain::canonical_locator::CanonicalLocator;
use crate::domain::content_surface::{ContentBridge, SurfaceClassifier, SurfaceKind};
use crate::domain::media_record::{BatchLabel, ImageBatch, ScrapedVideo};
use crate::domain::repositories::MediaRecordStore;
use crate::domain::resolution::ImageDecision;
use crate::domain::selection_session::{
    SelectionSession, SessionGeneration, SessionMode, SessionTransitionError,
};
use crate::infrastructure::config::{SessionConfig, SurfaceConfig};

/// Point-in-time view of the session for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub generation: u64,
    pub chosen_count: usize,
    pub last_synced_count: usize,
    pub page: Option<String>,
    pub surface: Option<SurfaceKind>,
}

#[derive(Default)]
struct OrchestratorState {
    session: SelectionSession,
    /// Raw locator of the page currently shown.
    page: Option<String>,
    /// Raw locator of the page the active session was started on.
    session_page: Option<String>,
    poll: Option<CancellationToken>,
}

impl OrchestratorState {
    fn stop_poll(&mut self) {
        if let Some(token) = self.poll.take() {
            token.cancel();
        }
    }
}

/// Marks a decision prompt as open until dropped. Outlives session resets so a
/// new session cannot start while an abandoned commit still waits on the user.
struct PendingDecision<'a>(&'a AtomicUsize);

impl<'a> PendingDecision<'a> {
    fn open(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingDecision<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SessionOrchestrator {
    bridge: Arc<dyn ContentBridge>,
    resolver: DuplicateResolver,
    decisions: Arc<dyn DecisionSource>,
    classifier: SurfaceClassifier,
    poll_interval: Duration,
    state: Arc<Mutex<OrchestratorState>>,
    counter: Arc<watch::Sender<usize>>,
    pending_decisions: AtomicUsize,
}

impl SessionOrchestrator {
    pub fn new(
        bridge: Arc<dyn ContentBridge>,
        store: Arc<dyn MediaRecordStore>,
        decisions: Arc<dyn DecisionSource>,
        session_config: &SessionConfig,
        surface_config: &SurfaceConfig,
    ) -> Self {
        let (counter, _) = watch::channel(0);
        Self {
            bridge,
            resolver: DuplicateResolver::new(store),
            decisions,
            classifier: SurfaceClassifier::new(
                surface_config.video_page_marker.as_str(),
                surface_config.image_page_marker.as_str(),
            ),
            poll_interval: session_config.poll_interval(),
            state: Arc::new(Mutex::new(OrchestratorState::default())),
            counter: Arc::new(counter),
            pending_decisions: AtomicUsize::new(0),
        }
    }

    /// Receiver of the polled selection count shown while marking.
    pub fn display_counter(&self) -> watch::Receiver<usize> {
        self.counter.subscribe()
    }

    pub fn resolver(&self) -> &DuplicateResolver {
        &self.resolver
    }

    pub async fn mode(&self) -> SessionMode {
        self.state.lock().await.session.mode()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            mode: state.session.mode(),
            generation: state.session.generation().value(),
            chosen_count: state.session.chosen().len(),
            last_synced_count: state.session.last_synced_count(),
            page: state.page.clone(),
            surface: state.page.as_deref().map(|p| self.classifier.classify(p)),
        }
    }

    // ===============================
    // NAVIGATION
    // ===============================

    /// Record that the surface now shows `raw_locator`. Leaving the page an
    /// active session was started on abandons that session.
    pub async fn navigate(&self, raw_locator: &str) -> Option<StatusMessage> {
        let leaving_session_page = {
            let mut state = self.state.lock().await;
            state.page = Some(raw_locator.to_string());
            state.session.mode().is_active()
                && state.session_page.as_deref() != Some(raw_locator)
        };
        debug!(
            "Surface navigated to {} ({:?})",
            raw_locator,
            self.classifier.classify(raw_locator)
        );

        if leaving_session_page && self.abandon("navigation").await {
            Some(StatusMessage::SelectionAbandoned)
        } else {
            None
        }
    }

    pub fn classify(&self, raw_locator: &str) -> SurfaceKind {
        self.classifier.classify(raw_locator)
    }

    // ===============================
    // GESTURES
    // ===============================

    /// Single toggle gesture: start marking when idle, commit when marking.
    pub async fn primary_gesture(&self) -> StatusMessage {
        let mode = self.mode().await;
        match mode {
            SessionMode::Idle => self.begin_mark().await,
            SessionMode::Active => self.commit().await,
            SessionMode::Resolving => StatusMessage::DecisionPending,
        }
    }

    pub async fn begin_mark(&self) -> StatusMessage {
        let generation = {
            let mut state = self.state.lock().await;
            let Some(page) = state.page.clone() else {
                return StatusMessage::NotOnImageGallery;
            };
            if !self.classifier.classify(&page).supports_marking() {
                return StatusMessage::NotOnImageGallery;
            }
            if state.session.mode() == SessionMode::Idle
                && self.pending_decisions.load(Ordering::SeqCst) > 0
            {
                debug!("beginMark refused: an earlier decision is still open");
                return StatusMessage::DecisionPending;
            }
            match state.session.begin_mark() {
                Ok(generation) => {
                    state.session_page = Some(page);
                    generation
                }
                Err(SessionTransitionError::AlreadyActive) => {
                    debug!("beginMark ignored: session already active");
                    return StatusMessage::AlreadyMarking;
                }
                Err(_) => return StatusMessage::DecisionPending,
            }
        };

        if !self.bridge.inject().await {
            let mut state = self.state.lock().await;
            if state.session.revert_failed_injection(generation).is_ok() {
                state.session_page = None;
            }
            warn!("Selection session {} reverted: injection failed", generation);
            return StatusMessage::InjectionFailed;
        }

        {
            let mut state = self.state.lock().await;
            if state.session.generation() == generation && state.session.mode().is_active() {
                state.poll = Some(self.spawn_display_poll(generation));
                self.counter.send_replace(0);
                info!(
                    "🖱️ Selection session {} started ({:?})",
                    generation,
                    state.session.session_id()
                );
                return StatusMessage::MarkingStarted;
            }
        }

        // Abandoned while the capability was being installed.
        self.bridge.clear().await;
        StatusMessage::SelectionAbandoned
    }

    pub async fn commit(&self) -> StatusMessage {
        let generation = {
            let state = self.state.lock().await;
            match state.session.mode() {
                SessionMode::Idle => return StatusMessage::NotMarking,
                SessionMode::Resolving => return StatusMessage::DecisionPending,
                SessionMode::Active => state.session.generation(),
            }
        };

        // The surface holds the authoritative selection.
        let selection = self.bridge.read_selection().await;

        let (owner, pending) = {
            let mut state = self.state.lock().await;
            if state.session.reconcile(generation, selection.iter().cloned()).is_err() {
                return StatusMessage::SelectionAbandoned;
            }
            self.counter.send_replace(state.session.last_synced_count());
            if selection.iter().all(|member| member.trim().is_empty()) {
                return StatusMessage::NothingSelected;
            }
            if state.session.begin_resolving(generation).is_err() {
                return StatusMessage::DecisionPending;
            }
            let owner = state
                .session_page
                .as_deref()
                .map(CanonicalLocator::normalize)
                .unwrap_or_default();
            (owner, PendingDecision::open(&self.pending_decisions))
        };

        let batch_size = selection.iter().filter(|m| !m.trim().is_empty()).count();
        let input = self.decisions.describe_images(batch_size).await;
        if !self.is_resolving(generation).await {
            info!("Selection session {} left while the label prompt was open", generation);
            return StatusMessage::SelectionAbandoned;
        }
        let Some(input) = input else {
            return self.resume(generation, StatusMessage::SaveCancelled).await;
        };
        let Ok(label) = BatchLabel::new(&input.label, input.comments.as_deref()) else {
            return self.resume(generation, StatusMessage::LabelRequired).await;
        };

        let batch = ImageBatch::new(selection, owner, label);
        let saved = self.save_batch(generation, &batch).await;
        drop(pending);

        match saved {
            Ok(None) => StatusMessage::SelectionAbandoned,
            Ok(Some(outcome)) if outcome.dismissed() => {
                self.resume(generation, StatusMessage::SaveCancelled).await
            }
            Ok(Some(outcome)) => {
                self.finish(generation).await;
                if outcome.saved == 0 && outcome.decision == Some(ImageDecision::SaveNewOnly) {
                    StatusMessage::NoNewImages {
                        skipped: outcome.skipped,
                    }
                } else {
                    StatusMessage::ImagesSaved {
                        saved: outcome.saved,
                        skipped: outcome.skipped,
                    }
                }
            }
            Err(e) if e.is_not_configured() => {
                self.resume(generation, StatusMessage::not_configured("saving images"))
                    .await
            }
            Err(e) => {
                error!("Image batch save failed: {}", e);
                self.resume(generation, StatusMessage::save_failed(e)).await
            }
        }
    }

    /// Duplicate lookup, decision and write for one commit. `Ok(None)` when the
    /// session was abandoned before anything was written.
    async fn save_batch(
        &self,
        generation: SessionGeneration,
        batch: &ImageBatch,
    ) -> Result<Option<ImageSaveOutcome>, ResolutionError> {
        let duplicates = self.resolver.find_image_duplicates(batch).await?;
        let decision = if duplicates.is_empty() {
            None
        } else {
            debug!(
                "{} of {} images already stored; awaiting decision",
                duplicates.len(),
                batch.len()
            );
            Some(self.decisions.decide_images(batch, &duplicates).await)
        };

        if !self.is_resolving(generation).await {
            info!("Selection session {} left before its batch was written", generation);
            return Ok(None);
        }
        let outcome = match decision {
            None => self.resolver.insert_new_images(batch).await?,
            Some(decision) => {
                self.resolver
                    .apply_image_decision(batch, &duplicates, decision)
                    .await?
            }
        };
        Ok(Some(outcome))
    }

    pub async fn cancel(&self) -> StatusMessage {
        if self.abandon("cancel").await {
            StatusMessage::SelectionCancelled
        } else {
            StatusMessage::NotMarking
        }
    }

    // ===============================
    // VIDEO INTAKE
    // ===============================

    pub async fn save_scraped_video(&self, scraped: ScrapedVideo) -> StatusMessage {
        let missing = scraped.missing_elements();
        if !missing.is_empty() {
            warn!("Scraped video is missing {} elements: {:?}", missing.len(), missing);
        }

        let candidate = scraped.into_record(Utc::now());
        let saved = {
            let _pending = PendingDecision::open(&self.pending_decisions);
            self.resolver
                .save_video(candidate, self.decisions.as_ref())
                .await
        };
        match saved {
            Ok(outcome) => StatusMessage::from_video_action(outcome.action),
            Err(e) if e.is_not_configured() => StatusMessage::not_configured("saving videos"),
            Err(e) => {
                error!("Video save failed: {}", e);
                StatusMessage::save_failed(e)
            }
        }
    }

    /// Distinct playlist labels for the save form; empty when unavailable.
    pub async fn playlists(&self) -> Vec<String> {
        self.resolver
            .store()
            .list_distinct_playlist_labels()
            .await
            .unwrap_or_else(|e| {
                warn!("Could not list playlists: {}", e);
                Vec::new()
            })
    }

    // ===============================
    // TRANSITIONS
    // ===============================

    async fn is_resolving(&self, generation: SessionGeneration) -> bool {
        let state = self.state.lock().await;
        state.session.generation() == generation && state.session.mode() == SessionMode::Resolving
    }

    async fn resume(&self, generation: SessionGeneration, message: StatusMessage) -> StatusMessage {
        let mut state = self.state.lock().await;
        if let Err(e) = state.session.resume_marking(generation) {
            debug!("Session not resumed: {}", e);
        }
        message
    }

    async fn finish(&self, generation: SessionGeneration) {
        let completed = {
            let mut state = self.state.lock().await;
            let completed = state.session.complete(generation).is_ok();
            if completed {
                state.stop_poll();
                state.session_page = None;
                self.counter.send_replace(0);
            }
            completed
        };
        if completed {
            self.bridge.clear().await;
            info!("✅ Selection session {} committed", generation);
        }
    }

    /// Drop any active session and clear the surface. Returns `false` when idle.
    async fn abandon(&self, reason: &str) -> bool {
        let abandoned = {
            let mut state = self.state.lock().await;
            let abandoned = state.session.abandon();
            if abandoned.is_some() {
                state.stop_poll();
                state.session_page = None;
                self.counter.send_replace(0);
            }
            abandoned
        };

        match abandoned {
            Some(generation) => {
                self.bridge.clear().await;
                info!("Selection session {} abandoned ({})", generation, reason);
                true
            }
            None => false,
        }
    }

    fn spawn_display_poll(&self, generation: SessionGeneration) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let bridge = Arc::clone(&self.bridge);
        let state = Arc::clone(&self.state);
        let counter = Arc::clone(&self.counter);
        let period = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let count = bridge.read_selection_count().await;
                        let mut guard = state.lock().await;
                        if !guard.session.record_display_count(generation, count) {
                            debug!("Discarding late selection count for session {}", generation);
                            break;
                        }
                        counter.send_replace(count);
                    }
                }
            }
        });
        token
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            state.stop_poll();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::decision_source::LabelInput;
    use crate::domain::media_record::{ImageRecord, VideoRecord};
    use tokio::sync::Notify;
    use crate::domain::resolution::VideoDecision;
    use crate::test_utils::TestDatabase;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GALLERY: &str = "https://media.example/browse/images?page=1";

    #[derive(Default)]
    struct CountingBridge {
        injects: AtomicUsize,
        clears: AtomicUsize,
        reads: AtomicUsize,
        refuse_inject: bool,
        selection: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ContentBridge for CountingBridge {
        async fn inject(&self) -> bool {
            self.injects.fetch_add(1, Ordering::SeqCst);
            !self.refuse_inject
        }

        async fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }

        async fn read_selection(&self) -> Vec<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.selection.lock().unwrap().clone()
        }

        async fn read_selection_count(&self) -> usize {
            self.selection.lock().unwrap().len()
        }
    }

    struct FixedLabel(Option<&'static str>);

    #[async_trait]
    impl DecisionSource for FixedLabel {
        async fn decide_video(&self, _: &VideoRecord, _: &VideoRecord) -> VideoDecision {
            VideoDecision::KeepExisting
        }

        async fn describe_images(&self, _: usize) -> Option<LabelInput> {
            self.0.map(|label| LabelInput::new(label, None))
        }

        async fn decide_images(&self, _: &ImageBatch, _: &[ImageRecord]) -> ImageDecision {
            ImageDecision::SaveNewOnly
        }
    }

    /// Holds every prompt open until the test releases it.
    #[derive(Default)]
    struct GatedPrompt {
        opened: Notify,
        release: Notify,
    }

    impl GatedPrompt {
        async fn hold(&self) {
            self.opened.notify_one();
            self.release.notified().await;
        }
    }

    #[async_trait]
    impl DecisionSource for GatedPrompt {
        async fn decide_video(&self, _: &VideoRecord, _: &VideoRecord) -> VideoDecision {
            self.hold().await;
            VideoDecision::OverwriteWithNew
        }

        async fn describe_images(&self, _: usize) -> Option<LabelInput> {
            self.hold().await;
            Some(LabelInput::new("late", None))
        }

        async fn decide_images(&self, _: &ImageBatch, _: &[ImageRecord]) -> ImageDecision {
            self.hold().await;
            ImageDecision::SaveAll
        }
    }

    async fn orchestrator(
        bridge: Arc<CountingBridge>,
        label: Option<&'static str>,
    ) -> (SessionOrchestrator, TestDatabase) {
        let db = TestDatabase::new().await.unwrap();
        let orchestrator = SessionOrchestrator::new(
            bridge,
            Arc::new(db.media_repository()),
            Arc::new(FixedLabel(label)),
            &SessionConfig::default(),
            &SurfaceConfig::default(),
        );
        (orchestrator, db)
    }

    #[tokio::test]
    async fn test_begin_mark_requires_gallery() {
        let bridge = Arc::new(CountingBridge::default());
        let (orchestrator, _db) = orchestrator(bridge.clone(), Some("x")).await;

        assert_eq!(orchestrator.begin_mark().await, StatusMessage::NotOnImageGallery);
        orchestrator.navigate("https://media.example/videos/1").await;
        assert_eq!(orchestrator.begin_mark().await, StatusMessage::NotOnImageGallery);
        assert_eq!(bridge.injects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_begin_mark_does_not_inject_again() {
        let bridge = Arc::new(CountingBridge::default());
        let (orchestrator, _db) = orchestrator(bridge.clone(), Some("x")).await;
        orchestrator.navigate(GALLERY).await;

        assert_eq!(orchestrator.begin_mark().await, StatusMessage::MarkingStarted);
        assert_eq!(orchestrator.begin_mark().await, StatusMessage::AlreadyMarking);
        assert_eq!(bridge.injects.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.mode().await, SessionMode::Active);
    }

    #[tokio::test]
    async fn test_failed_injection_reverts_to_idle() {
        let bridge = Arc::new(CountingBridge {
            refuse_inject: true,
            ..Default::default()
        });
        let (orchestrator, _db) = orchestrator(bridge, Some("x")).await;
        orchestrator.navigate(GALLERY).await;

        assert_eq!(orchestrator.begin_mark().await, StatusMessage::InjectionFailed);
        assert_eq!(orchestrator.mode().await, SessionMode::Idle);
    }

    #[tokio::test]
    async fn test_empty_commit_stays_active() {
        let bridge = Arc::new(CountingBridge::default());
        let (orchestrator, db) = orchestrator(bridge.clone(), Some("x")).await;
        orchestrator.navigate(GALLERY).await;
        orchestrator.begin_mark().await;

        assert_eq!(orchestrator.commit().await, StatusMessage::NothingSelected);
        assert_eq!(orchestrator.mode().await, SessionMode::Active);
        assert_eq!(bridge.clears.load(Ordering::SeqCst), 0);
        let stats = db.media_repository().statistics().await.unwrap();
        assert_eq!(stats.total_images, 0);
    }

    #[tokio::test]
    async fn test_commit_saves_and_clears() {
        let bridge = Arc::new(CountingBridge::default());
        *bridge.selection.lock().unwrap() = vec!["a.jpg".into(), "b.jpg".into()];
        let (orchestrator, db) = orchestrator(bridge.clone(), Some("beach")).await;
        orchestrator.navigate(GALLERY).await;
        orchestrator.begin_mark().await;

        assert_eq!(
            orchestrator.commit().await,
            StatusMessage::ImagesSaved { saved: 2, skipped: 0 }
        );
        assert_eq!(orchestrator.mode().await, SessionMode::Idle);
        assert_eq!(bridge.clears.load(Ordering::SeqCst), 1);

        let owner = CanonicalLocator::normalize(GALLERY);
        let stored = db.media_repository().list_images_for_owner(&owner).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|image| image.label == "beach"));
    }

    #[tokio::test]
    async fn test_blank_label_keeps_session_active() {
        let bridge = Arc::new(CountingBridge::default());
        *bridge.selection.lock().unwrap() = vec!["a.jpg".into()];
        let (orchestrator, _db) = orchestrator(bridge.clone(), Some("   ")).await;
        orchestrator.navigate(GALLERY).await;
        orchestrator.begin_mark().await;

        assert_eq!(orchestrator.commit().await, StatusMessage::LabelRequired);
        assert_eq!(orchestrator.mode().await, SessionMode::Active);
        assert_eq!(bridge.clears.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_navigation_away_abandons_session() {
        let bridge = Arc::new(CountingBridge::default());
        let (orchestrator, _db) = orchestrator(bridge.clone(), Some("x")).await;
        orchestrator.navigate(GALLERY).await;
        orchestrator.begin_mark().await;

        let message = orchestrator.navigate("https://media.example/videos/2").await;
        assert_eq!(message, Some(StatusMessage::SelectionAbandoned));
        assert_eq!(orchestrator.mode().await, SessionMode::Idle);
        assert_eq!(bridge.clears.load(Ordering::SeqCst), 1);

        assert_eq!(orchestrator.navigate(GALLERY).await, None);
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_noop() {
        let bridge = Arc::new(CountingBridge::default());
        let (orchestrator, _db) = orchestrator(bridge.clone(), Some("x")).await;
        assert_eq!(orchestrator.cancel().await, StatusMessage::NotMarking);
        assert_eq!(bridge.clears.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_only_selection_stays_active() {
        let bridge = Arc::new(CountingBridge::default());
        *bridge.selection.lock().unwrap() = vec!["  ".into(), String::new()];
        let (orchestrator, db) = orchestrator(bridge.clone(), Some("x")).await;
        orchestrator.navigate(GALLERY).await;
        orchestrator.begin_mark().await;

        assert_eq!(orchestrator.commit().await, StatusMessage::NothingSelected);
        assert_eq!(orchestrator.mode().await, SessionMode::Active);
        assert_eq!(bridge.clears.load(Ordering::SeqCst), 0);
        let stats = db.media_repository().statistics().await.unwrap();
        assert_eq!(stats.total_images, 0);
    }

    #[tokio::test]
    async fn test_leaving_page_during_label_prompt_discards_commit() {
        let bridge = Arc::new(CountingBridge::default());
        *bridge.selection.lock().unwrap() = vec!["a.jpg".into(), "b.jpg".into()];
        let db = TestDatabase::new().await.unwrap();
        let prompt = Arc::new(GatedPrompt::default());
        let orchestrator = SessionOrchestrator::new(
            bridge.clone(),
            Arc::new(db.media_repository()),
            prompt.clone(),
            &SessionConfig::default(),
            &SurfaceConfig::default(),
        );
        orchestrator.navigate(GALLERY).await;
        orchestrator.begin_mark().await;

        let (committed, ()) = tokio::join!(orchestrator.commit(), async {
            prompt.opened.notified().await;
            assert_eq!(
                orchestrator.navigate("https://media.example/videos/3").await,
                Some(StatusMessage::SelectionAbandoned)
            );
            assert_eq!(orchestrator.navigate(GALLERY).await, None);
            // 이전 프롬프트가 열려 있는 동안에는 새 세션을 시작하지 않는다
            assert_eq!(orchestrator.begin_mark().await, StatusMessage::DecisionPending);
            prompt.release.notify_one();
        });

        assert_eq!(committed, StatusMessage::SelectionAbandoned);
        assert_eq!(orchestrator.mode().await, SessionMode::Idle);
        let stats = db.media_repository().statistics().await.unwrap();
        assert_eq!(stats.total_images, 0);

        assert_eq!(orchestrator.begin_mark().await, StatusMessage::MarkingStarted);
    }

    #[tokio::test]
    async fn test_open_video_decision_blocks_begin_mark() {
        let bridge = Arc::new(CountingBridge::default());
        let db = TestDatabase::new().await.unwrap();
        let prompt = Arc::new(GatedPrompt::default());
        let orchestrator = SessionOrchestrator::new(
            bridge.clone(),
            Arc::new(db.media_repository()),
            prompt.clone(),
            &SessionConfig::default(),
            &SurfaceConfig::default(),
        );
        let scraped = |title: &str| ScrapedVideo {
            url: "https://media.example/videos/7".into(),
            title: Some(title.into()),
            ..ScrapedVideo::default()
        };
        orchestrator.save_scraped_video(scraped("First")).await;
        orchestrator.navigate(GALLERY).await;

        let (_, ()) = tokio::join!(orchestrator.save_scraped_video(scraped("Second")), async {
            prompt.opened.notified().await;
            assert_eq!(orchestrator.begin_mark().await, StatusMessage::DecisionPending);
            prompt.release.notify_one();
        });

        assert_eq!(bridge.injects.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.begin_mark().await, StatusMessage::MarkingStarted);
    }
}
