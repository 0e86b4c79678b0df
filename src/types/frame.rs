//! Frame types flowing from the decoder to the destination

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result};

/// One decoded video frame: a row-major grid of 8-bit samples.
///
/// Supported layouts are 1 channel (luma), 3 channels (RGB) and 4 channels
/// (RGBA). A raw frame is owned by the frame source for a single decode step
/// and is never retained after encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl RawFrame {
    /// Create a raw frame, validating the buffer length against the geometry.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PlayerError::decode_failed(
                "<frame>",
                format!("empty frame geometry {}x{}", width, height),
            ));
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(PlayerError::decode_failed(
                "<frame>",
                format!("unsupported channel count {}", channels),
            ));
        }

        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PlayerError::decode_failed(
                "<frame>",
                format!(
                    "frame buffer holds {} bytes, {}x{}x{} needs {}",
                    data.len(),
                    width,
                    height,
                    channels,
                    expected
                ),
            ));
        }

        Ok(Self { width, height, channels, data })
    }

    /// Create a single-channel luminance frame.
    pub fn luma(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, 1, data)
    }

    /// Create a frame where every luminance sample has the same value.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self { width, height, channels: 1, data: vec![value; width as usize * height as usize] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Render size of one playback run, in source samples before tiling.
///
/// Passed explicitly through the frame source and encoder for each run, so
/// concurrent sessions with different sizes never share mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for RenderSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Immutable glyph-art frame: rows of braille characters joined by `\n`.
///
/// Cloning is cheap (shared buffer), which lets the scheduler keep the last
/// transmitted frame around for duplicate detection.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GlyphFrame(Arc<str>);

impl GlyphFrame {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Frame shown in place of glyphs when a single frame cannot be encoded.
    pub fn diagnostic(reason: impl fmt::Display) -> Self {
        Self(format!("frame conversion failed: {}", reason).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of glyph rows.
    pub fn line_count(&self) -> usize {
        if self.0.is_empty() { 0 } else { self.0.lines().count() }
    }

    /// Length in characters of the longest row.
    pub fn max_line_len(&self) -> usize {
        self.0.lines().map(|line| line.chars().count()).max().unwrap_or(0)
    }
}

impl std::ops::Deref for GlyphFrame {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlyphFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for GlyphFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlyphFrame({} lines)", self.line_count())
    }
}
