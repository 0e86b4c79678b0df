//! Player configuration
//!
//! Every key is optional; missing keys take their defaults. Reading the file
//! from disk is left to the host application.
//!
//! ```rust
//! use glyphcast::PlayerConfig;
//!
//! let config = PlayerConfig::from_yaml_str("braille_width: 80\nmax_frame_rate: 5\n").unwrap();
//! assert_eq!(config.braille_width, 80);
//! assert_eq!(config.braille_height, 30);
//! assert_eq!(config.max_frame_rate, 5.0);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scheduler::{DEFAULT_FINISHED_TEXT, DEFAULT_PLACEHOLDER_TEXT};
use crate::types::RenderSize;
use crate::{PlayerError, Result};

pub const DEFAULT_VIDEO_DIRECTORY: &str = "videos";
pub const DEFAULT_BRAILLE_WIDTH: u32 = 60;
pub const DEFAULT_BRAILLE_HEIGHT: u32 = 30;
pub const DEFAULT_MAX_FRAME_RATE: f64 = 10.0;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
pub const DEFAULT_MAX_UPLOADS_PER_IP: usize = 3;
pub const DEFAULT_UPLOAD_WINDOW_SECS: u64 = 3600;

/// Settings for a [`crate::Player`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Directory holding playable videos
    pub video_directory: PathBuf,
    /// Default render width in samples (two per glyph)
    pub braille_width: u32,
    /// Default render height in samples (four per glyph)
    pub braille_height: u32,
    /// Emission ceiling in frames per second
    pub max_frame_rate: f64,
    pub max_file_size_mb: u64,
    pub max_concurrent_uploads_per_ip: usize,
    pub upload_window_secs: u64,
    pub placeholder_text: String,
    pub finished_text: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            video_directory: PathBuf::from(DEFAULT_VIDEO_DIRECTORY),
            braille_width: DEFAULT_BRAILLE_WIDTH,
            braille_height: DEFAULT_BRAILLE_HEIGHT,
            max_frame_rate: DEFAULT_MAX_FRAME_RATE,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            max_concurrent_uploads_per_ip: DEFAULT_MAX_UPLOADS_PER_IP,
            upload_window_secs: DEFAULT_UPLOAD_WINDOW_SECS,
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
            finished_text: DEFAULT_FINISHED_TEXT.to_string(),
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            PlayerError::config("YAML deserialization", format!("YAML parsing failed: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall playback or admit nothing.
    pub fn validate(&self) -> Result<()> {
        if self.braille_width == 0 || self.braille_height == 0 {
            return Err(PlayerError::config(
                "braille size",
                format!("{}x{} has a zero dimension", self.braille_width, self.braille_height),
            ));
        }

        if !self.max_frame_rate.is_finite() || self.max_frame_rate <= 0.0 {
            return Err(PlayerError::config(
                "max_frame_rate",
                format!("{} is not a positive rate", self.max_frame_rate),
            ));
        }

        if self.max_concurrent_uploads_per_ip == 0 {
            return Err(PlayerError::config("max_concurrent_uploads_per_ip", "must be at least 1"));
        }

        if self.upload_window_secs == 0 {
            return Err(PlayerError::config("upload_window_secs", "must be at least 1"));
        }

        Ok(())
    }

    /// Render size used when a play request gives none.
    pub fn default_render_size(&self) -> RenderSize {
        RenderSize::new(self.braille_width, self.braille_height)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn upload_window(&self) -> Duration {
        Duration::from_secs(self.upload_window_secs)
    }
}
