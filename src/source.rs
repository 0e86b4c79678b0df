//! Frame source: video file to lazy glyph frame stream

use std::path::{Path, PathBuf};

use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info, warn};

use crate::decoder::{DecoderBackend, VideoDecoder, VideoInfo};
use crate::encoder::GlyphEncoder;
use crate::types::{GlyphFrame, RenderSize};
use crate::Result;

/// Lazy, finite sequence of glyph frames. Ends after the first error.
pub type GlyphFrames = BoxStream<'static, Result<GlyphFrame>>;

/// An opened video ready to be streamed once.
///
/// [`FrameSource::frames`] consumes the source: a second pass needs a fresh
/// [`FrameSource::open`].
pub struct FrameSource {
    path: PathBuf,
    decoder: Box<dyn VideoDecoder>,
}

impl FrameSource {
    /// Open a video through the given backend.
    pub async fn open(backend: &dyn DecoderBackend, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoder = backend.open(path).await?;
        Ok(Self { path: path.to_path_buf(), decoder })
    }

    /// Wrap an already opened decoder.
    pub fn from_decoder(path: impl Into<PathBuf>, decoder: Box<dyn VideoDecoder>) -> Self {
        Self { path: path.into(), decoder }
    }

    /// Source frame rate and resolution.
    pub fn info(&self) -> VideoInfo {
        self.decoder.info()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream glyph frames rendered at `size`.
    ///
    /// Each pull decodes exactly one frame, encodes it off the async workers
    /// and yields to the runtime before handing it back. The decoder is closed
    /// when the stream ends and released by drop when the stream is abandoned.
    pub fn frames(self, size: RenderSize) -> GlyphFrames {
        let state = Decoding {
            path: self.path,
            decoder: self.decoder,
            encoder: GlyphEncoder::new(size),
            decoded: 0,
        };

        futures::stream::unfold(Some(state), |state| async move {
            let mut state = state?;

            match state.decoder.next_frame().await {
                Ok(Some(raw)) => {
                    state.decoded += 1;
                    let encoder = state.encoder;
                    let glyphs = match tokio::task::spawn_blocking(move || encoder.encode(&raw)).await
                    {
                        Ok(glyphs) => glyphs,
                        Err(e) => {
                            warn!("Encoder task failed on frame {}: {}", state.decoded, e);
                            GlyphFrame::diagnostic(e)
                        }
                    };
                    tokio::task::yield_now().await;
                    Some((Ok(glyphs), Some(state)))
                }
                Ok(None) => {
                    info!("Video {} ended after {} frames", state.path.display(), state.decoded);
                    state.release().await;
                    None
                }
                Err(e) => {
                    warn!("Decoding {} failed: {}", state.path.display(), e);
                    state.release().await;
                    Some((Err(e), None))
                }
            }
        })
        .boxed()
    }
}

struct Decoding {
    path: PathBuf,
    decoder: Box<dyn VideoDecoder>,
    encoder: GlyphEncoder,
    decoded: u64,
}

impl Decoding {
    async fn release(&mut self) {
        if let Err(e) = self.decoder.close().await {
            warn!("Failed to close decoder for {}: {}", self.path.display(), e);
        } else {
            debug!("Released decoder for {}", self.path.display());
        }
    }
}
