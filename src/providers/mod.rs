//! Decoder backends
//!
//! - [`ffmpeg::FfmpegBackend`] decodes real video files through `ffprobe`/`ffmpeg`
//! - [`synthetic::SyntheticBackend`] serves in-memory frame sequences

pub mod ffmpeg;
pub mod synthetic;

pub use ffmpeg::{FfmpegBackend, FfmpegDecoder};
pub use synthetic::{SyntheticBackend, SyntheticClip, SyntheticDecoder};
