//! Error types for glyph playback.
//!
//! Every fallible operation in the crate returns [`PlayerError`]. Variants carry
//! enough context (file path, platform, failing operation) to be logged once at
//! the task boundary and relayed to the destination as a short notice.
//!
//! ## Error Categories
//!
//! - **Decode Errors**: the video file is missing, corrupt or unreadable
//! - **Transport Errors**: a send or edit call to the chat platform failed
//! - **Message Id Errors**: the platform accepted a message but returned no usable id
//! - **Platform Errors**: unknown platform, or a platform that cannot edit messages
//! - **Command Errors**: malformed `/video` commands
//! - **Config Errors**: invalid configuration values
//!
//! Admission rejections and cancellations are not errors. They are reported as
//! [`crate::Admission::Rejected`] and [`crate::PlaybackState::Cancelled`].
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use glyphcast::PlayerError;
//!
//! let error = PlayerError::transport_failed("qq", "edit", "HTTP 502");
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for playback operations.
pub type Result<T, E = PlayerError> = std::result::Result<T, E>;

/// Main error type for playback operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PlayerError {
    #[error("Failed to decode {path}: {reason}")]
    Decode {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Video file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} on platform '{platform}' failed: {reason}")]
    Transport {
        platform: String,
        operation: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("No message id in response from platform '{platform}': {response}")]
    MissingMessageId { platform: String, response: String },

    #[error("No adapter registered for platform '{platform}'")]
    UnknownPlatform { platform: String },

    #[error("Platform '{platform}' does not support message editing")]
    EditUnsupported { platform: String },

    #[error("Video '{name}' not found")]
    VideoNotFound { name: String },

    #[error("Invalid command: {details}")]
    InvalidCommand { details: String },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },
}

impl PlayerError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Transport failures are deliberately not retryable: a session stops on the
    /// first failed edit instead of hammering a failing destination.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlayerError::Decode { .. } => false,
            PlayerError::File { .. } => false,
            PlayerError::Transport { .. } => false,
            PlayerError::MissingMessageId { .. } => false,
            PlayerError::UnknownPlatform { .. } => false,
            PlayerError::EditUnsupported { .. } => false,
            PlayerError::VideoNotFound { .. } => false,
            PlayerError::InvalidCommand { .. } => true,
            PlayerError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PlayerError::Decode { .. } => vec![
                "Check that the video file exists and is readable",
                "Verify ffmpeg and ffprobe are installed and on PATH",
                "Re-encode the video into a common container (mp4, mkv)",
            ],
            PlayerError::File { .. } => vec![
                "Check file exists and is readable",
                "Check directory permissions",
            ],
            PlayerError::Transport { .. } => vec![
                "Check the platform adapter is connected",
                "Lower max_frame_rate if the platform rate-limits edits",
                "Start playback again once the platform recovers",
            ],
            PlayerError::MissingMessageId { .. } => vec![
                "Check the adapter returns the id of sent messages",
                "Verify the bot may send messages to this target",
            ],
            PlayerError::UnknownPlatform { .. } => vec![
                "Register an adapter for this platform",
                "Check the platform name spelling",
            ],
            PlayerError::EditUnsupported { .. } => vec![
                "Use a platform whose adapter supports message editing",
            ],
            PlayerError::VideoNotFound { .. } => vec![
                "Use `/video list` to see the available videos",
                "Quote file names containing spaces",
            ],
            PlayerError::InvalidCommand { .. } => vec![
                "Use `/video` to show the command help",
                "Check quotes are balanced",
            ],
            PlayerError::Config { .. } => vec![
                "Check the configuration values are positive",
                "Remove the key to fall back to its default",
            ],
        }
    }

    /// Helper constructor for decode failures without an underlying source.
    pub fn decode_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PlayerError::Decode { path: path.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for decode failures with source.
    pub fn decode_failed_with_source(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PlayerError::Decode { path: path.into(), reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        PlayerError::File { path, source }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(
        platform: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PlayerError::Transport {
            platform: platform.into(),
            operation: operation.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Helper constructor for invalid commands.
    pub fn invalid_command(details: impl Into<String>) -> Self {
        PlayerError::InvalidCommand { details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        PlayerError::Config { context: context.into(), details: details.into() }
    }

    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        match self {
            PlayerError::File { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            PlayerError::Decode { source: Some(source), .. } => source
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound),
            PlayerError::VideoNotFound { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        PlayerError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
