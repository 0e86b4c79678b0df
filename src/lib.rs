//! Video playback as braille glyph art in editable chat messages.
//!
//! Glyphcast decodes a video, renders every frame as rows of braille glyphs and
//! streams them to a chat destination by repeatedly editing one message.
//!
//! # Features
//!
//! - **Deterministic encoding**: area-averaged, 2x4-dot braille tiles
//! - **Paced streaming**: source rate capped by a ceiling, duplicate frames skipped
//! - **Session control**: stop every playback for a chat in one call
//! - **Upload admission**: per-origin sliding-window limiter
//!
//! # Architecture
//!
//! ```text
//! DecoderBackend ─► FrameSource ─► GlyphEncoder ─► PlaybackScheduler ─► MessageAdapter
//!                                                        ▲
//!                              Player ─► SessionRegistry ┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use glyphcast::encoder::GlyphEncoder;
//! use glyphcast::types::{RawFrame, RenderSize};
//!
//! let encoder = GlyphEncoder::new(RenderSize::new(4, 4));
//! let frame = encoder.encode(&RawFrame::filled(32, 32, 0));
//! assert_eq!(frame.as_str(), "\u{28FF}\u{28FF}");
//! ```

// Core types and error handling
pub mod adapters;
pub mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Frame pipeline
pub mod decoder;
pub mod encoder;
pub mod providers;
pub mod source;
pub mod stream;

// Session control
pub mod command;
pub mod library;
pub mod limiter;
pub mod player;
pub mod registry;
pub mod scheduler;

// Core exports
pub use adapters::{AdapterRegistry, MessageAdapter, MessageId};
pub use config::PlayerConfig;
pub use error::*;
pub use types::*;

// Pipeline exports
pub use decoder::{DecoderBackend, VideoDecoder, VideoInfo};
pub use encoder::GlyphEncoder;
pub use source::FrameSource;

// Session exports
pub use limiter::{UploadAdmissionLimiter, UploadPermit};
pub use player::{Admission, PlaybackHandle, PlaybackStart, Player};
pub use registry::{Registration, SessionRegistry, TaskId};
pub use scheduler::{PlaybackReport, PlaybackScheduler, PlaybackState};
