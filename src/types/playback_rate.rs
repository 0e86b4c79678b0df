//! Emission rate control for playback sessions

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pacing used when neither the source nor the configuration gives a usable rate.
pub const FALLBACK_FPS: f64 = 10.0;

/// Effective emission rate of one playback run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlaybackRate {
    /// Source rate is at or below the ceiling, emit at source speed
    Source(f64),

    /// Source is faster than the ceiling, emit at the ceiling
    Capped(f64),

    /// Source rate unknown or non-positive
    Fallback(f64),
}

impl PlaybackRate {
    /// Normalize the source rate against the configured ceiling.
    ///
    /// The effective rate is `min(source_fps, max_fps)`. A missing, NaN or
    /// non-positive source rate falls back to the ceiling, or to
    /// [`FALLBACK_FPS`] when the ceiling itself is unusable.
    pub fn normalize(source_fps: Option<f64>, max_fps: f64) -> Self {
        let ceiling = (max_fps.is_finite() && max_fps > 0.0).then_some(max_fps);

        match source_fps.filter(|fps| fps.is_finite() && *fps > 0.0) {
            None => PlaybackRate::Fallback(ceiling.unwrap_or(FALLBACK_FPS)),
            Some(fps) => match ceiling {
                Some(max) if fps > max => PlaybackRate::Capped(max),
                _ => PlaybackRate::Source(fps),
            },
        }
    }

    /// Frames per second actually emitted.
    pub fn fps(self) -> f64 {
        match self {
            PlaybackRate::Source(fps) | PlaybackRate::Capped(fps) | PlaybackRate::Fallback(fps) => {
                fps
            }
        }
    }

    /// Delay applied after every frame decision.
    pub fn interval(self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps())
    }

    /// Check if the source is being slowed down
    pub fn is_capped(self) -> bool {
        matches!(self, PlaybackRate::Capped(_))
    }
}
