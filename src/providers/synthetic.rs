//! In-memory decoder backend
//!
//! Serves pre-built frame sequences registered under virtual paths. Used for
//! tests, benchmarks and demos where spawning ffmpeg is not wanted. The
//! backend counts decode pulls and releases so callers can check how a source
//! was consumed.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::decoder::{DecoderBackend, VideoDecoder, VideoInfo};
use crate::types::RawFrame;
use crate::{PlayerError, Result};

/// A frame sequence with an optional source rate.
#[derive(Debug, Clone)]
pub struct SyntheticClip {
    pub fps: Option<f64>,
    pub frames: Vec<RawFrame>,
    /// Fail with a decode error after this many frames
    pub fail_after: Option<usize>,
}

impl SyntheticClip {
    pub fn new(fps: Option<f64>, frames: Vec<RawFrame>) -> Self {
        Self { fps, frames, fail_after: None }
    }

    /// Make the clip report a corrupt stream after `frames` pulls.
    pub fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    fn info(&self) -> VideoInfo {
        let (width, height) =
            self.frames.first().map(|f| (f.width(), f.height())).unwrap_or((0, 0));
        VideoInfo { fps: self.fps, width, height }
    }
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    pulls: AtomicUsize,
    releases: AtomicUsize,
}

/// Backend serving [`SyntheticClip`]s by path.
#[derive(Debug, Clone, Default)]
pub struct SyntheticBackend {
    clips: Arc<RwLock<HashMap<PathBuf, SyntheticClip>>>,
    counters: Arc<Counters>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip under a virtual path.
    pub fn insert(&self, path: impl Into<PathBuf>, clip: SyntheticClip) {
        self.clips.write().insert(path.into(), clip);
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Number of `next_frame` calls across all decoders.
    pub fn pull_count(&self) -> usize {
        self.counters.pulls.load(Ordering::SeqCst)
    }

    /// Number of decoders released, by close or by drop.
    pub fn release_count(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DecoderBackend for SyntheticBackend {
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoDecoder>> {
        let clip = self.clips.read().get(path).cloned().ok_or_else(|| {
            PlayerError::decode_failed_with_source(
                path,
                "cannot open video",
                Box::new(std::io::Error::new(std::io::ErrorKind::NotFound, "no such clip")),
            )
        })?;

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        debug!("Opened synthetic clip {} ({} frames)", path.display(), clip.frames.len());

        Ok(Box::new(SyntheticDecoder {
            path: path.to_path_buf(),
            info: clip.info(),
            fail_after: clip.fail_after,
            frames: clip.frames.into(),
            served: 0,
            counters: Arc::clone(&self.counters),
            released: false,
        }))
    }
}

/// Decoder over an in-memory frame queue.
pub struct SyntheticDecoder {
    path: PathBuf,
    info: VideoInfo,
    frames: VecDeque<RawFrame>,
    fail_after: Option<usize>,
    served: usize,
    counters: Arc<Counters>,
    released: bool,
}

impl SyntheticDecoder {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.frames.clear();
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl VideoDecoder for SyntheticDecoder {
    fn info(&self) -> VideoInfo {
        self.info
    }

    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        self.counters.pulls.fetch_add(1, Ordering::SeqCst);

        if self.fail_after == Some(self.served) {
            return Err(PlayerError::decode_failed(&self.path, "corrupt packet"));
        }

        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.served += 1;
        }
        Ok(frame)
    }

    async fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for SyntheticDecoder {
    fn drop(&mut self) {
        self.release();
    }
}
