//! Core value types shared by every stage of playback.
//!
//! - [`RawFrame`] is one decoded frame, owned by the frame source for a single step
//! - [`GlyphFrame`] is the immutable braille text produced by the encoder
//! - [`RenderSize`] is the per-run output size threaded through source and encoder
//! - [`DestinationKey`] identifies a chat destination for session lookup
//! - [`PlaybackRate`] is the effective emission rate of a run
//!
//! ## Usage Example
//!
//! ```rust
//! use glyphcast::types::{DestinationKey, PlaybackRate, RawFrame};
//!
//! let frame = RawFrame::filled(8, 8, 255);
//! assert_eq!(frame.data().len(), 64);
//!
//! let key = DestinationKey::group("qq", "12345");
//! assert_eq!(key.to_string(), "qq/group/12345");
//!
//! let rate = PlaybackRate::normalize(Some(30.0), 10.0);
//! assert_eq!(rate.fps(), 10.0);
//! ```

mod destination;
mod frame;
mod playback_rate;

pub use destination::{DestinationKey, TargetKind};
pub use frame::{GlyphFrame, RawFrame, RenderSize};
pub use playback_rate::{FALLBACK_FPS, PlaybackRate};
