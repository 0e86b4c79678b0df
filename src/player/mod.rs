//! Player facade: the operations a host application calls.
//!
//! [`Player`] owns the process-wide state (session registry, upload limiter)
//! and wires the collaborators together: adapters for chat platforms, a
//! decoder backend for video files, and a library directory for the `/video`
//! command surface.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use glyphcast::{AdapterRegistry, PlaybackStart, Player, PlayerConfig};
//! use glyphcast::providers::FfmpegBackend;
//! use glyphcast::types::DestinationKey;
//!
//! # async fn run(adapters: AdapterRegistry) -> glyphcast::Result<()> {
//! let player = Player::new(PlayerConfig::default(), adapters, Arc::new(FfmpegBackend::new()))?;
//! let key = DestinationKey::group("qq", "123456");
//!
//! if let PlaybackStart::Accepted(handle) = player.start_playback("videos/intro.mp4", key.clone(), None).await {
//!     if let Some(report) = handle.wait().await {
//!         println!("{}", report);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::AdapterRegistry;
use crate::command::{self, VideoCommand, VideoSelector};
use crate::config::PlayerConfig;
use crate::decoder::DecoderBackend;
use crate::library::{VideoEntry, VideoLibrary};
use crate::limiter::{UploadAdmissionLimiter, UploadPermit};
use crate::registry::{SessionRegistry, TaskId};
use crate::scheduler::{PlaybackReport, PlaybackScheduler, notify};
use crate::source::FrameSource;
use crate::types::{DestinationKey, RenderSize};
use crate::{PlayerError, Result};

/// Outcome of [`Player::start_playback`].
#[derive(Debug)]
pub enum PlaybackStart {
    Accepted(PlaybackHandle),
    Rejected { reason: String },
}

impl PlaybackStart {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PlaybackStart::Accepted(_))
    }
}

/// A running playback task.
#[derive(Debug)]
pub struct PlaybackHandle {
    pub task_id: TaskId,
    pub key: DestinationKey,
    pub size: RenderSize,
    join: JoinHandle<PlaybackReport>,
}

impl PlaybackHandle {
    /// Wait for the run to end. `None` if the task panicked or was aborted.
    pub async fn wait(self) -> Option<PlaybackReport> {
        match self.join.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Playback {} on {} did not finish: {}", self.task_id, self.key, e);
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Outcome of [`Player::admit_upload`].
#[derive(Debug)]
pub enum Admission {
    /// Holds the upload slot until dropped
    Admitted(UploadPermit),
    Rejected { reason: String },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

/// Video-to-chat player.
pub struct Player {
    config: PlayerConfig,
    adapters: AdapterRegistry,
    backend: Arc<dyn DecoderBackend>,
    registry: Arc<SessionRegistry>,
    limiter: Arc<UploadAdmissionLimiter>,
    scheduler: PlaybackScheduler,
    library: VideoLibrary,
}

impl Player {
    pub fn new(
        config: PlayerConfig,
        adapters: AdapterRegistry,
        backend: Arc<dyn DecoderBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let scheduler = PlaybackScheduler::new(config.max_frame_rate)
            .with_texts(config.placeholder_text.clone(), config.finished_text.clone());
        let limiter =
            UploadAdmissionLimiter::new(config.max_concurrent_uploads_per_ip, config.upload_window());
        let library = VideoLibrary::new(config.video_directory.clone());

        info!(
            "Player ready: {} platforms, library {}, {} fps ceiling",
            adapters.platforms().count(),
            library.root().display(),
            config.max_frame_rate
        );

        Ok(Self {
            config,
            adapters,
            backend,
            registry: Arc::new(SessionRegistry::new()),
            limiter: Arc::new(limiter),
            scheduler,
            library,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn library(&self) -> &VideoLibrary {
        &self.library
    }

    /// Start playing a video to `key`.
    ///
    /// Rejected before anything is sent when the platform is unknown, cannot
    /// edit messages, or the video cannot be opened. An accepted task is
    /// registered before this returns, so an immediate
    /// [`Player::stop_playback`] always reaches it.
    pub async fn start_playback(
        &self,
        path: impl AsRef<Path>,
        key: DestinationKey,
        size: Option<RenderSize>,
    ) -> PlaybackStart {
        let path = path.as_ref();
        match self.try_start(path, key.clone(), size).await {
            Ok(handle) => {
                info!("Accepted {} for {} as {}", path.display(), key, handle.task_id);
                PlaybackStart::Accepted(handle)
            }
            Err(e) => {
                warn!("Rejected playback of {} for {}: {}", path.display(), key, e);
                PlaybackStart::Rejected { reason: rejection_reason(&e) }
            }
        }
    }

    async fn try_start(
        &self,
        path: &Path,
        key: DestinationKey,
        size: Option<RenderSize>,
    ) -> Result<PlaybackHandle> {
        let adapter = self.adapters.resolve(&key.platform)?;
        if !adapter.supports_edit() {
            return Err(PlayerError::EditUnsupported { platform: key.platform.clone() });
        }

        let source = FrameSource::open(self.backend.as_ref(), path).await?;
        let size = size.unwrap_or_else(|| self.config.default_render_size());

        let registration = self.registry.register(key.clone());
        let task_id = registration.id();
        let scheduler = self.scheduler.clone();
        let join = tokio::spawn(async move { scheduler.run(registration, adapter, source, size).await });

        Ok(PlaybackHandle { task_id, key, size, join })
    }

    /// Cancel every playback under `key`. Returns how many were signalled.
    pub fn stop_playback(&self, key: &DestinationKey) -> usize {
        let stopped = self.registry.cancel_all(key);
        info!("Stop for {} signalled {} tasks", key, stopped);
        stopped
    }

    /// Gate an upload of `size_bytes` from `origin`.
    pub fn admit_upload(&self, origin: &str, size_bytes: u64) -> Admission {
        if size_bytes > self.config.max_file_size_bytes() {
            warn!("Rejected {} byte upload from {}: over size limit", size_bytes, origin);
            return Admission::Rejected {
                reason: format!("File too large (max {}MB)", self.config.max_file_size_mb),
            };
        }

        self.limiter.purge_expired();
        match self.limiter.admit(origin) {
            Some(permit) => Admission::Admitted(permit),
            None => {
                warn!("Rejected upload from {}: concurrency limit reached", origin);
                Admission::Rejected {
                    reason: format!(
                        "Too many uploads from {} (max {} per {}s), try again later",
                        origin, self.config.max_concurrent_uploads_per_ip, self.config.upload_window_secs
                    ),
                }
            }
        }
    }

    /// Release an upload slot once the upload finished or failed.
    pub fn release_upload(&self, permit: UploadPermit) {
        drop(permit);
    }

    pub async fn list_videos(&self) -> Result<Vec<VideoEntry>> {
        self.library.list().await
    }

    /// Handle a chat message addressed from `key`.
    ///
    /// Returns `None` when the message is not a `/video` command. Otherwise
    /// the reply is sent to `key` (best effort) and returned.
    pub async fn handle_command(&self, key: &DestinationKey, text: &str) -> Option<String> {
        let reply = match command::parse(text) {
            Ok(None) => return None,
            Ok(Some(command)) => {
                info!("{} issued {:?}", key, command);
                self.execute(key, command).await
            }
            Err(PlayerError::InvalidCommand { details }) => details,
            Err(e) => format!("Error while handling command: {}", e),
        };

        if let Some(adapter) = self.adapters.get(&key.platform) {
            notify(adapter.as_ref(), key, &reply).await;
        }
        Some(reply)
    }

    async fn execute(&self, key: &DestinationKey, command: VideoCommand) -> String {
        match command {
            VideoCommand::Help => command::HELP_TEXT.to_string(),
            VideoCommand::Unknown(_) => command::UNKNOWN_COMMAND_TEXT.to_string(),
            VideoCommand::List => match self.list_videos().await {
                Ok(videos) if videos.is_empty() => "No videos found".to_string(),
                Ok(videos) => {
                    let lines: Vec<_> = videos
                        .iter()
                        .enumerate()
                        .map(|(i, video)| format!("{}. {}", i + 1, video.filename))
                        .collect();
                    format!("Available videos:\n{}", lines.join("\n"))
                }
                Err(e) => format!("Error while handling command: {}", e),
            },
            VideoCommand::Stop => match self.stop_playback(key) {
                0 => "No video is playing".to_string(),
                stopped => format!("Stopped all video playback ({} tasks)", stopped),
            },
            VideoCommand::Play { video, size } => self.play_command(key, video, size).await,
        }
    }

    async fn play_command(
        &self,
        key: &DestinationKey,
        video: VideoSelector,
        size: Option<RenderSize>,
    ) -> String {
        let name = match video {
            VideoSelector::Index(index) => match self.library.by_index(index).await {
                Ok(Some(entry)) => entry.filename,
                Ok(None) => {
                    return format!(
                        "Invalid video number: {}, use /video list to see the available videos",
                        index
                    );
                }
                Err(e) => return format!("Error while handling command: {}", e),
            },
            VideoSelector::Name(name) => name,
        };

        if !self.adapters.supports_edit(&key.platform) {
            return format!("Platform {} does not support message editing", key.platform);
        }

        let path = match self.library.resolve(&name).await {
            Ok(path) => path,
            Err(e) if e.is_not_found() => return format!("Video file {} does not exist", name),
            Err(e) => return format!("Error while handling command: {}", e),
        };

        match self.start_playback(&path, key.clone(), size).await {
            PlaybackStart::Accepted(handle) if size.is_some() => {
                format!("Playing video: {} ({})", name, handle.size)
            }
            PlaybackStart::Accepted(_) => format!("Playing video: {}", name),
            PlaybackStart::Rejected { reason } => reason,
        }
    }

    /// Cancel every running playback. Returns how many were signalled.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.registry.cancel_everything();
        info!("Player shutting down, cancelled {} playbacks", cancelled);
        cancelled
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("adapters", &self.adapters)
            .field("library", &self.library.root())
            .field("active_destinations", &self.registry.len())
            .finish()
    }
}

fn rejection_reason(err: &PlayerError) -> String {
    match err {
        PlayerError::UnknownPlatform { platform } => format!("Unknown platform {}", platform),
        PlayerError::EditUnsupported { platform } => {
            format!("Platform {} does not support message editing", platform)
        }
        e if e.is_not_found() => "Video file does not exist".to_string(),
        e => format!("Cannot play video: {}", e),
    }
}

#[cfg(test)]
mod tests;
