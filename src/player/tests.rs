use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::providers::SyntheticBackend;
use crate::scheduler::{DEFAULT_FINISHED_TEXT, PlaybackState};
use crate::test_utils::{RecordingAdapter, ResponseShape, moving_bar_clip, static_clip};

const SIZE: Option<RenderSize> = Some(RenderSize::new(16, 8));

struct Fixture {
    player: Player,
    backend: SyntheticBackend,
    adapter: Arc<RecordingAdapter>,
    no_edit: Arc<RecordingAdapter>,
    _library: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self::with_adapter(RecordingAdapter::new())
    }

    fn with_adapter(adapter: RecordingAdapter) -> Self {
        let _ = tracing_subscriber::fmt::try_init();

        let library = tempfile::tempdir().unwrap();
        let config =
            PlayerConfig { video_directory: library.path().to_path_buf(), ..PlayerConfig::default() };

        let backend = SyntheticBackend::new();
        let adapter = Arc::new(adapter);
        let no_edit = Arc::new(RecordingAdapter::without_edit());
        let adapters = AdapterRegistry::new().with("qq", adapter.clone()).with("sms", no_edit.clone());

        let player = Player::new(config, adapters, Arc::new(backend.clone())).unwrap();
        Self { player, backend, adapter, no_edit, _library: library }
    }

    /// Add a clip both on disk (for the library) and to the decoder backend.
    fn add_video(&self, name: &str, clip: crate::providers::SyntheticClip) -> std::path::PathBuf {
        let path = self.player.library().root().join(name);
        std::fs::write(&path, b"").unwrap();
        self.backend.insert(path.clone(), clip);
        path
    }

    async fn play(&self, path: &std::path::Path, key: &DestinationKey) -> PlaybackHandle {
        match self.player.start_playback(path, key.clone(), SIZE).await {
            PlaybackStart::Accepted(handle) => handle,
            PlaybackStart::Rejected { reason } => panic!("playback rejected: {}", reason),
        }
    }
}

fn chat() -> DestinationKey {
    DestinationKey::group("qq", "1001")
}

#[tokio::test(start_paused = true)]
async fn capped_playback_paces_edits() {
    let fx = Fixture::new();
    let path = fx.add_video("bar.mp4", moving_bar_clip(10, Some(30.0)));

    let report = fx.play(&path, &chat()).await.wait().await.unwrap();

    assert_eq!(report.state, PlaybackState::Completed);
    assert_eq!(report.frames_decoded, 10);
    // 10 frames plus the end-of-stream probe
    assert_eq!(fx.backend.pull_count(), 11);
    assert_eq!(fx.backend.release_count(), 1);

    let edits = fx.adapter.edits();
    let (finished, frames) = edits.split_last().unwrap();
    assert_eq!(finished.text(), DEFAULT_FINISHED_TEXT);
    assert!(frames.len() <= 10);
    assert_eq!(frames.len() as u64, report.frames_transmitted);
    for pair in edits.windows(2) {
        assert!(pair[1].at() - pair[0].at() >= Duration::from_millis(100));
    }
    assert!(!fx.player.registry().contains(&chat()));
}

#[tokio::test(start_paused = true)]
async fn platforms_without_edit_are_rejected_before_sending() {
    let fx = Fixture::new();
    let path = fx.add_video("bar.mp4", moving_bar_clip(3, None));
    let key = DestinationKey::user("sms", "42");

    let start = fx.player.start_playback(&path, key.clone(), None).await;

    match start {
        PlaybackStart::Rejected { reason } => assert!(reason.contains("does not support")),
        PlaybackStart::Accepted(_) => panic!("playback accepted"),
    }
    assert_eq!(fx.no_edit.send_count(), 0);
    assert_eq!(fx.backend.open_count(), 0);
    assert!(fx.player.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn immediate_stop_sends_at_most_one_frame() {
    let fx = Fixture::new();
    let path = fx.add_video("bar.mp4", moving_bar_clip(10, Some(30.0)));

    let handle = fx.play(&path, &chat()).await;
    assert_eq!(fx.player.stop_playback(&chat()), 1);
    let report = handle.wait().await.unwrap();

    assert_eq!(report.state, PlaybackState::Cancelled);
    assert!(report.frames_transmitted <= 1);
    assert!(fx.adapter.edit_count() <= 1);
    assert!(!fx.player.registry().contains(&chat()));
    assert_eq!(fx.backend.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_mid_stream_skips_the_final_edit() {
    let fx = Fixture::new();
    let path = fx.add_video("bar.mp4", moving_bar_clip(10, Some(10.0)));

    let handle = fx.play(&path, &chat()).await;
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(fx.player.stop_playback(&chat()), 1);
    let report = handle.wait().await.unwrap();

    assert_eq!(report.state, PlaybackState::Cancelled);
    assert_eq!(report.frames_transmitted, 4);
    assert!(!fx.adapter.edit_texts().iter().any(|t| t == DEFAULT_FINISHED_TEXT));
}

#[tokio::test(start_paused = true)]
async fn identical_frames_produce_one_edit() {
    let fx = Fixture::new();
    let path = fx.add_video("still.mp4", static_clip(2, Some(10.0)));

    let report = fx.play(&path, &chat()).await.wait().await.unwrap();

    assert_eq!(report.frames_transmitted, 1);
    assert_eq!(report.frames_skipped, 1);
    // One frame, then the finished text
    assert_eq!(fx.adapter.edit_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn edit_failure_ends_the_session_and_unregisters() {
    let fx = Fixture::with_adapter(RecordingAdapter::new().failing_edits_after(3));
    let path = fx.add_video("bar.mp4", moving_bar_clip(10, None));

    let report = fx.play(&path, &chat()).await.wait().await.unwrap();

    assert_eq!(report.state, PlaybackState::Failed);
    assert_eq!(report.frames_transmitted, 3);
    assert!(fx.player.registry().is_empty());
    assert_eq!(fx.backend.release_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_message_id_never_sends_frames() {
    let fx = Fixture::with_adapter(RecordingAdapter::new().with_shape(ResponseShape::Empty));
    let path = fx.add_video("bar.mp4", moving_bar_clip(3, None));

    let report = fx.play(&path, &chat()).await.wait().await.unwrap();

    assert_eq!(report.state, PlaybackState::Failed);
    assert!(matches!(report.error, Some(PlayerError::MissingMessageId { .. })));
    assert_eq!(fx.adapter.edit_count(), 0);
    assert!(fx.player.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn nested_message_ids_are_accepted() {
    for shape in [ResponseShape::DataWrapped, ResponseShape::MessageInfo] {
        let fx = Fixture::with_adapter(RecordingAdapter::new().with_shape(shape));
        let path = fx.add_video("bar.mp4", moving_bar_clip(2, None));

        let report = fx.play(&path, &chat()).await.wait().await.unwrap();
        assert_eq!(report.state, PlaybackState::Completed, "{:?}", shape);
    }
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_every_task_under_the_key_only() {
    let fx = Fixture::new();
    let path = fx.add_video("bar.mp4", moving_bar_clip(10, Some(10.0)));
    let other = DestinationKey::user("qq", "7");

    let first = fx.play(&path, &chat()).await;
    let second = fx.play(&path, &chat()).await;
    let bystander = fx.play(&path, &other).await;
    assert_eq!(fx.player.registry().active_tasks(&chat()), 2);

    assert_eq!(fx.player.stop_playback(&chat()), 2);
    assert_eq!(first.wait().await.unwrap().state, PlaybackState::Cancelled);
    assert_eq!(second.wait().await.unwrap().state, PlaybackState::Cancelled);

    assert_eq!(fx.player.stop_playback(&chat()), 0);
    assert_eq!(bystander.wait().await.unwrap().state, PlaybackState::Completed);
    assert!(fx.player.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_platforms_and_videos_are_rejected() {
    let fx = Fixture::new();
    let path = fx.add_video("bar.mp4", moving_bar_clip(1, None));

    let start = fx.player.start_playback(&path, DestinationKey::user("fax", "1"), None).await;
    assert!(!start.is_accepted());

    let missing = fx.player.library().root().join("missing.mp4");
    match fx.player.start_playback(&missing, chat(), None).await {
        PlaybackStart::Rejected { reason } => assert_eq!(reason, "Video file does not exist"),
        PlaybackStart::Accepted(_) => panic!("missing video accepted"),
    }
    assert_eq!(fx.adapter.send_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_everything() {
    let fx = Fixture::new();
    let path = fx.add_video("bar.mp4", moving_bar_clip(10, None));

    let a = fx.play(&path, &chat()).await;
    let b = fx.play(&path, &DestinationKey::user("qq", "7")).await;

    assert_eq!(fx.player.shutdown(), 2);
    assert_eq!(a.wait().await.unwrap().state, PlaybackState::Cancelled);
    assert_eq!(b.wait().await.unwrap().state, PlaybackState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn upload_admission() {
    let fx = Fixture::new();
    let origin = "203.0.113.5";

    let permits: Vec<_> = (0..3).map(|_| fx.player.admit_upload(origin, 1024)).collect();
    assert!(permits.iter().all(Admission::is_admitted));
    assert!(!fx.player.admit_upload(origin, 1024).is_admitted());

    let mut permits = permits.into_iter();
    if let Some(Admission::Admitted(permit)) = permits.next() {
        fx.player.release_upload(permit);
    }
    assert!(fx.player.admit_upload(origin, 1024).is_admitted());

    match fx.player.admit_upload("198.51.100.9", 51 * 1024 * 1024) {
        Admission::Rejected { reason } => assert!(reason.contains("50MB")),
        Admission::Admitted(_) => panic!("oversized upload admitted"),
    }
}

#[tokio::test(start_paused = true)]
async fn upload_window_expiry_readmits() {
    let fx = Fixture::new();
    let origin = "203.0.113.5";

    // Leaked permits: the window still frees the slots
    for _ in 0..3 {
        if let Admission::Admitted(permit) = fx.player.admit_upload(origin, 1) {
            std::mem::forget(permit);
        }
    }
    assert!(!fx.player.admit_upload(origin, 1).is_admitted());

    tokio::time::advance(Duration::from_secs(3601)).await;
    assert!(fx.player.admit_upload(origin, 1).is_admitted());
}

#[test]
fn invalid_config_is_refused() {
    let config = PlayerConfig { max_frame_rate: 0.0, ..PlayerConfig::default() };
    let result = Player::new(config, AdapterRegistry::new(), Arc::new(SyntheticBackend::new()));
    assert!(matches!(result, Err(PlayerError::Config { .. })));
}

mod commands {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn non_commands_get_no_reply() {
        let fx = Fixture::new();
        assert_eq!(fx.player.handle_command(&chat(), "hello there").await, None);
        assert_eq!(fx.adapter.send_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn help_and_unknown() {
        let fx = Fixture::new();
        let help = fx.player.handle_command(&chat(), "/video").await.unwrap();
        assert_eq!(help, command::HELP_TEXT);

        let unknown = fx.player.handle_command(&chat(), "/video rewind").await.unwrap();
        assert_eq!(unknown, command::UNKNOWN_COMMAND_TEXT);
        assert_eq!(fx.adapter.send_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn list_numbers_videos() {
        let fx = Fixture::new();
        assert_eq!(fx.player.handle_command(&chat(), "/video list").await.unwrap(), "No videos found");

        fx.add_video("b.mkv", moving_bar_clip(1, None));
        fx.add_video("a.mp4", moving_bar_clip(1, None));
        let reply = fx.player.handle_command(&chat(), "/video list").await.unwrap();
        assert_eq!(reply, "Available videos:\n1. a.mp4\n2. b.mkv");
        assert_eq!(fx.adapter.sends().last().unwrap().text(), reply);
    }

    #[tokio::test(start_paused = true)]
    async fn play_by_number_then_stop() {
        let fx = Fixture::new();
        fx.add_video("a.mp4", moving_bar_clip(10, Some(10.0)));
        fx.add_video("b.mp4", moving_bar_clip(10, Some(10.0)));

        let reply = fx.player.handle_command(&chat(), "/video play 2 20 1").await.unwrap();
        assert_eq!(reply, "Playing video: b.mp4 (20x5)");
        assert_eq!(fx.player.registry().active_tasks(&chat()), 1);

        let reply = fx.player.handle_command(&chat(), "/video stop").await.unwrap();
        assert_eq!(reply, "Stopped all video playback (1 tasks)");

        let reply = fx.player.handle_command(&chat(), "/video stop").await.unwrap();
        assert_eq!(reply, "No video is playing");
    }

    #[tokio::test(start_paused = true)]
    async fn play_by_quoted_name() {
        let fx = Fixture::new();
        fx.add_video("my clip.mp4", moving_bar_clip(2, None));

        let reply = fx.player.handle_command(&chat(), r#"/video play "my clip.mp4""#).await.unwrap();
        assert_eq!(reply, "Playing video: my clip.mp4");
        fx.player.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn play_errors_are_replied() {
        let fx = Fixture::new();
        fx.add_video("a.mp4", moving_bar_clip(1, None));

        let reply = fx.player.handle_command(&chat(), "/video play 9").await.unwrap();
        assert!(reply.starts_with("Invalid video number: 9"));

        let reply = fx.player.handle_command(&chat(), "/video play nope.mp4").await.unwrap();
        assert_eq!(reply, "Video file nope.mp4 does not exist");

        let reply = fx.player.handle_command(&chat(), "/video play").await.unwrap();
        assert_eq!(reply, command::PLAY_USAGE);

        let reply = fx.player.handle_command(&chat(), "/video play 'a.mp4").await.unwrap();
        assert_eq!(reply, command::QUOTE_ERROR);

        let reply = fx.player.handle_command(&chat(), "/video play 1 x y").await.unwrap();
        assert_eq!(reply, command::SIZE_ERROR);

        let sms = DestinationKey::user("sms", "1");
        let reply = fx.player.handle_command(&sms, "/video play 1").await.unwrap();
        assert_eq!(reply, "Platform sms does not support message editing");
        assert!(fx.player.registry().is_empty());
    }
}
