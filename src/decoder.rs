//! Decoder traits for video sources

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::RawFrame;

/// Stream properties reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Source frame rate, `None` when the container does not report one
    pub fps: Option<f64>,
    pub width: u32,
    pub height: u32,
}

/// An open video being decoded frame by frame.
///
/// Implementations must release their underlying resources when dropped, so
/// that abandoning a half-read video (early break, cancelled task) never leaks
/// a decoder. [`VideoDecoder::close`] is the graceful path taken on normal
/// exhaustion.
#[async_trait::async_trait]
pub trait VideoDecoder: Send + 'static {
    /// Source frame rate and resolution.
    fn info(&self) -> VideoInfo;

    /// Decode the next frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - Next frame decoded
    /// - `Ok(None)` - End of stream
    /// - `Err(e)` - The source is corrupt or unreadable
    async fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Release the decoder. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Opens video files into [`VideoDecoder`]s.
#[async_trait::async_trait]
pub trait DecoderBackend: Send + Sync + 'static {
    /// Open a video file.
    ///
    /// Fails with [`crate::PlayerError::Decode`] when the file is missing or
    /// cannot be read by the backend.
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoDecoder>>;
}
