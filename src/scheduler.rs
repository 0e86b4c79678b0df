//! Playback scheduler: drives one frame source against one destination
//!
//! A run sends a placeholder message, captures its id, then edits that message
//! with every frame that differs from the previous one. Every frame decision is
//! followed by a pacing delay of `1 / rate`. The run ends in one of three
//! terminal states and always drops its [`Registration`] on the way out.
//!
//! Every suspension point (placeholder send, frame pull, edit, pacing sleep)
//! races the registration's cancellation token, so a stop takes effect within
//! one pacing interval at worst.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::adapters::{MessageAdapter, MessageId, extract_message_id};
use crate::registry::{Registration, TaskId};
use crate::source::FrameSource;
use crate::stream::{DedupExt, Emission};
use crate::types::{DestinationKey, PlaybackRate, RenderSize};
use crate::{PlayerError, Result};

/// Text of the message sent before the first frame.
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Loading video...";

/// Text of the final edit after the last frame.
pub const DEFAULT_FINISHED_TEXT: &str = "Video playback finished";

/// Lifecycle of one playback task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Starting,
    AwaitingMessageId,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl PlaybackState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Completed | PlaybackState::Failed | PlaybackState::Cancelled)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Starting => "starting",
            PlaybackState::AwaitingMessageId => "awaiting message id",
            PlaybackState::Streaming => "streaming",
            PlaybackState::Completed => "completed",
            PlaybackState::Failed => "failed",
            PlaybackState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Outcome of one playback run.
#[derive(Debug)]
pub struct PlaybackReport {
    pub task_id: TaskId,
    pub key: DestinationKey,
    pub state: PlaybackState,
    /// Effective emission rate, once known
    pub rate: Option<PlaybackRate>,
    /// Frames pulled from the source
    pub frames_decoded: u64,
    /// Frames sent as edits
    pub frames_transmitted: u64,
    /// Frames identical to their predecessor and not sent
    pub frames_skipped: u64,
    pub elapsed: Duration,
    /// Cause of a [`PlaybackState::Failed`] run
    pub error: Option<PlayerError>,
}

impl PlaybackReport {
    pub(crate) fn new(task_id: TaskId, key: DestinationKey) -> Self {
        Self {
            task_id,
            key,
            state: PlaybackState::Starting,
            rate: None,
            frames_decoded: 0,
            frames_transmitted: 0,
            frames_skipped: 0,
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    /// Report for a run that failed before streaming began.
    pub(crate) fn failed(task_id: TaskId, key: DestinationKey, error: PlayerError) -> Self {
        Self { state: PlaybackState::Failed, error: Some(error), ..Self::new(task_id, key) }
    }
}

impl fmt::Display for PlaybackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {} decoded, {} sent, {} skipped in {:.1}s",
            self.task_id,
            self.key,
            self.state,
            self.frames_decoded,
            self.frames_transmitted,
            self.frames_skipped,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Runs playback sessions with a fixed rate ceiling and message texts.
#[derive(Debug, Clone)]
pub struct PlaybackScheduler {
    placeholder_text: String,
    finished_text: String,
    max_fps: f64,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_FRAME_RATE)
    }
}

/// Early exit from a run that is not a failure.
enum Halt {
    Cancelled,
    Failed(PlayerError),
}

impl From<PlayerError> for Halt {
    fn from(err: PlayerError) -> Self {
        Halt::Failed(err)
    }
}

/// Race a suspension point against cancellation.
macro_rules! or_cancel {
    ($token:expr, $fut:expr) => {
        tokio::select! {
            biased;
            _ = $token.cancelled() => return Err(Halt::Cancelled),
            out = $fut => out,
        }
    };
}

impl PlaybackScheduler {
    pub fn new(max_fps: f64) -> Self {
        Self {
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
            finished_text: DEFAULT_FINISHED_TEXT.to_string(),
            max_fps,
        }
    }

    pub fn with_texts(mut self, placeholder: impl Into<String>, finished: impl Into<String>) -> Self {
        self.placeholder_text = placeholder.into();
        self.finished_text = finished.into();
        self
    }

    pub fn max_fps(&self) -> f64 {
        self.max_fps
    }

    pub fn finished_text(&self) -> &str {
        &self.finished_text
    }

    /// Play `source` to the registration's destination at `size`.
    ///
    /// Never fails outward: session failures are logged, relayed to the
    /// destination as a best-effort notice and recorded in the report. The
    /// registration is dropped before returning on every path.
    pub async fn run(
        &self,
        registration: Registration,
        adapter: Arc<dyn MessageAdapter>,
        source: FrameSource,
        size: RenderSize,
    ) -> PlaybackReport {
        let started = Instant::now();
        let key = registration.key().clone();
        let video = source.path().display().to_string();
        let mut report = PlaybackReport::new(registration.id(), key.clone());

        info!("Playing {} to {} at {}", video, key, size);

        match self.stream(&registration, adapter.as_ref(), source, size, &mut report).await {
            Ok(()) => {
                report.state = PlaybackState::Completed;
                info!(
                    "Finished {} on {}: {} frames sent, {} skipped",
                    video, key, report.frames_transmitted, report.frames_skipped
                );
            }
            Err(Halt::Cancelled) => {
                report.state = PlaybackState::Cancelled;
                info!("Playback of {} on {} cancelled after {} frames", video, key, report.frames_decoded);
            }
            Err(Halt::Failed(e)) => {
                error!("Playback of {} on {} failed while {}: {}", video, key, report.state, e);
                notify(adapter.as_ref(), &key, &failure_notice(&e)).await;
                report.state = PlaybackState::Failed;
                report.error = Some(e);
            }
        }

        report.elapsed = started.elapsed();
        drop(registration);
        debug!("{}", report);
        report
    }

    async fn stream(
        &self,
        registration: &Registration,
        adapter: &dyn MessageAdapter,
        source: FrameSource,
        size: RenderSize,
        report: &mut PlaybackReport,
    ) -> Result<(), Halt> {
        let key = registration.key();
        let cancel = registration.token();

        report.state = PlaybackState::AwaitingMessageId;
        let response = or_cancel!(cancel, adapter.send_text(key, &self.placeholder_text))?;
        let message_id = extract_message_id(&response).ok_or_else(|| {
            PlayerError::MissingMessageId { platform: key.platform.clone(), response: response.to_string() }
        })?;
        debug!("Placeholder for {} has message id {}", key, message_id);

        let rate = PlaybackRate::normalize(source.info().fps, self.max_fps);
        report.rate = Some(rate);
        let interval = rate.interval();
        info!("Streaming to {} at {:.2} fps ({:?})", key, rate.fps(), rate);

        report.state = PlaybackState::Streaming;
        let mut frames = source.frames(size).dedup_frames();

        loop {
            let Some(next) = or_cancel!(cancel, frames.next()) else {
                break;
            };
            let emission = next?;
            report.frames_decoded += 1;

            match emission {
                Emission::Changed(frame) => {
                    self.transmit(adapter, key, &message_id, &frame, cancel, report).await?;
                }
                Emission::Repeat => {
                    report.frames_skipped += 1;
                    trace!("Frame {} for {} unchanged, skipped", report.frames_decoded, key);
                }
            }

            or_cancel!(cancel, tokio::time::sleep(interval));
        }

        or_cancel!(cancel, adapter.edit_message(key, &message_id, &self.finished_text))?;
        Ok(())
    }

    async fn transmit(
        &self,
        adapter: &dyn MessageAdapter,
        key: &DestinationKey,
        message_id: &MessageId,
        frame: &str,
        cancel: &tokio_util::sync::CancellationToken,
        report: &mut PlaybackReport,
    ) -> Result<(), Halt> {
        or_cancel!(cancel, adapter.edit_message(key, message_id, frame))?;
        report.frames_transmitted += 1;

        if report.frames_transmitted % 10 == 0 {
            debug!("Sent {} frames to {}", report.frames_transmitted, key);
        }
        Ok(())
    }
}

fn failure_notice(err: &PlayerError) -> String {
    match err {
        PlayerError::MissingMessageId { .. } => "Playback failed: could not get a message id".to_string(),
        other => format!("Error while playing video: {}", other),
    }
}

/// Send a plain-text notice, swallowing failures.
pub(crate) async fn notify(adapter: &dyn MessageAdapter, key: &DestinationKey, text: &str) {
    if let Err(e) = adapter.send_text(key, text).await {
        warn!("Failed to deliver notice to {}: {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{SyntheticBackend, SyntheticClip};
    use crate::registry::SessionRegistry;
    use crate::test_utils::{RecordingAdapter, ResponseShape, moving_bar_clip, solid_frame};

    const SIZE: RenderSize = RenderSize::new(16, 8);

    struct Harness {
        registry: Arc<SessionRegistry>,
        backend: SyntheticBackend,
        key: DestinationKey,
    }

    impl Harness {
        fn new() -> Self {
            let _ = tracing_subscriber::fmt::try_init();
            Self {
                registry: Arc::new(SessionRegistry::new()),
                backend: SyntheticBackend::new(),
                key: DestinationKey::group("qq", "1001"),
            }
        }

        async fn run(
            &self,
            scheduler: &PlaybackScheduler,
            adapter: Arc<RecordingAdapter>,
            clip: SyntheticClip,
        ) -> PlaybackReport {
            self.backend.insert("clip.mp4", clip);
            let source = FrameSource::open(&self.backend, "clip.mp4").await.unwrap();
            let registration = self.registry.register(self.key.clone());
            scheduler.run(registration, adapter, source, SIZE).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completed_run_edits_every_frame_then_finishes() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new());
        let scheduler = PlaybackScheduler::new(10.0);

        let report = harness.run(&scheduler, adapter.clone(), moving_bar_clip(4, Some(30.0))).await;

        assert_eq!(report.state, PlaybackState::Completed);
        assert_eq!(report.rate, Some(PlaybackRate::Capped(10.0)));
        assert_eq!(report.frames_decoded, 4);
        assert_eq!(report.frames_transmitted, 4);
        assert!(report.error.is_none());

        assert_eq!(adapter.send_count(), 1);
        assert_eq!(adapter.sends()[0].text(), DEFAULT_PLACEHOLDER_TEXT);
        let texts = adapter.edit_texts();
        assert_eq!(texts.len(), 5);
        assert_eq!(texts.last().map(String::as_str), Some(DEFAULT_FINISHED_TEXT));
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn identical_frames_are_sent_once_but_still_paced() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new());
        let scheduler = PlaybackScheduler::new(10.0);
        let clip = SyntheticClip::new(Some(10.0), vec![solid_frame(16, 8, 0); 3]);

        let started = Instant::now();
        let report = harness.run(&scheduler, adapter.clone(), clip).await;

        assert_eq!(report.frames_transmitted, 1);
        assert_eq!(report.frames_skipped, 2);
        // One frame edit plus the final edit
        assert_eq!(adapter.edit_count(), 2);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_message_id_fails_without_frames() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new().with_shape(ResponseShape::Empty));
        let scheduler = PlaybackScheduler::new(10.0);

        let report = harness.run(&scheduler, adapter.clone(), moving_bar_clip(3, None)).await;

        assert_eq!(report.state, PlaybackState::Failed);
        assert!(matches!(report.error, Some(PlayerError::MissingMessageId { .. })));
        assert_eq!(report.frames_decoded, 0);
        assert_eq!(adapter.edit_count(), 0);
        // Placeholder plus the failure notice
        assert_eq!(adapter.send_count(), 2);
        assert!(harness.backend.release_count() >= 1);
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_failure_stops_without_retry() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new().failing_edits_after(2));
        let scheduler = PlaybackScheduler::new(10.0);

        let report = harness.run(&scheduler, adapter.clone(), moving_bar_clip(8, None)).await;

        assert_eq!(report.state, PlaybackState::Failed);
        assert!(matches!(report.error, Some(PlayerError::Transport { .. })));
        assert_eq!(report.frames_transmitted, 2);
        assert_eq!(report.frames_decoded, 3);
        assert_eq!(adapter.edit_count(), 2);
        assert!(adapter.sends().last().unwrap().text().starts_with("Error while playing video"));
        assert_eq!(harness.backend.release_count(), 1);
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn decode_failure_mid_stream_fails_the_run() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new());
        let scheduler = PlaybackScheduler::new(10.0);

        let report =
            harness.run(&scheduler, adapter.clone(), moving_bar_clip(5, None).failing_after(2)).await;

        assert_eq!(report.state, PlaybackState::Failed);
        assert!(matches!(report.error, Some(PlayerError::Decode { .. })));
        assert_eq!(report.frames_transmitted, 2);
        assert!(!adapter.edit_texts().iter().any(|t| t == DEFAULT_FINISHED_TEXT));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_pacing_sleep() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new());
        // 1 fps: one frame per second
        let scheduler = PlaybackScheduler::new(1.0);

        harness.backend.insert("slow.mp4", moving_bar_clip(10, Some(1.0)));
        let source = FrameSource::open(&harness.backend, "slow.mp4").await.unwrap();
        let registration = harness.registry.register(harness.key.clone());
        let task = {
            let scheduler = scheduler.clone();
            let adapter = adapter.clone();
            tokio::spawn(async move { scheduler.run(registration, adapter, source, SIZE).await })
        };

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let started = Instant::now();
        assert_eq!(harness.registry.cancel_all(&harness.key), 1);
        let report = task.await.unwrap();

        assert_eq!(report.state, PlaybackState::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(report.frames_transmitted, 2);
        assert!(!adapter.edit_texts().iter().any(|t| t == DEFAULT_FINISHED_TEXT));
        assert_eq!(harness.backend.release_count(), 1);
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_send_failure_fails_before_streaming() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new().failing_sends());
        let scheduler = PlaybackScheduler::new(10.0);

        let report = harness.run(&scheduler, adapter.clone(), moving_bar_clip(3, None)).await;

        assert_eq!(report.state, PlaybackState::Failed);
        assert!(matches!(report.error, Some(PlayerError::Transport { .. })));
        assert_eq!(report.frames_decoded, 0);
        assert_eq!(report.rate, None);
        // Neither the placeholder nor the notice got through
        assert_eq!(adapter.send_count(), 0);
        assert_eq!(adapter.edit_count(), 0);
        assert_eq!(harness.backend.release_count(), 1);
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn undeliverable_failure_notice_is_swallowed() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new().failing_sends_after(1).failing_edits_after(1));
        let scheduler = PlaybackScheduler::new(10.0);

        let report = harness.run(&scheduler, adapter.clone(), moving_bar_clip(5, None)).await;

        assert_eq!(report.state, PlaybackState::Failed);
        assert!(matches!(
            report.error,
            Some(PlayerError::Transport { ref operation, .. }) if operation == "edit"
        ));
        assert_eq!(report.frames_transmitted, 1);
        assert_eq!(adapter.sends()[0].text(), DEFAULT_PLACEHOLDER_TEXT);
        assert_eq!(adapter.send_count(), 1);
        assert_eq!(harness.backend.release_count(), 1);
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_placeholder_send_cancels_without_edits() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new().with_send_delay(Duration::from_millis(500)));
        let scheduler = PlaybackScheduler::new(10.0);

        harness.backend.insert("clip.mp4", moving_bar_clip(5, None));
        let source = FrameSource::open(&harness.backend, "clip.mp4").await.unwrap();
        let registration = harness.registry.register(harness.key.clone());
        let task = {
            let scheduler = scheduler.clone();
            let adapter = adapter.clone();
            tokio::spawn(async move { scheduler.run(registration, adapter, source, SIZE).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(harness.registry.cancel_all(&harness.key), 1);
        let report = task.await.unwrap();

        assert_eq!(report.state, PlaybackState::Cancelled);
        assert_eq!(report.frames_decoded, 0);
        assert!(report.error.is_none());
        assert_eq!(adapter.send_count(), 0);
        assert_eq!(adapter.edit_count(), 0);
        assert_eq!(harness.backend.release_count(), 1);
        assert!(harness.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_source_rate_falls_back_to_the_ceiling() {
        let harness = Harness::new();
        let adapter = Arc::new(RecordingAdapter::new());
        let scheduler = PlaybackScheduler::new(5.0);

        let report = harness.run(&scheduler, adapter, moving_bar_clip(2, None)).await;
        assert_eq!(report.rate, Some(PlaybackRate::Fallback(5.0)));
        assert!(report.elapsed >= Duration::from_millis(400));
        assert!(report.elapsed < Duration::from_millis(500));
    }

    #[test]
    fn terminal_states() {
        assert!(PlaybackState::Completed.is_terminal());
        assert!(PlaybackState::Failed.is_terminal());
        assert!(PlaybackState::Cancelled.is_terminal());
        assert!(!PlaybackState::Streaming.is_terminal());
        assert_eq!(PlaybackState::AwaitingMessageId.to_string(), "awaiting message id");
    }
}
