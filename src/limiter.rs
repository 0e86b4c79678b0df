//! Sliding-window upload admission per origin address.
//!
//! Each origin keeps an ordered list of admission timestamps. Timestamps older
//! than the window are pruned from the front on every admission attempt, so
//! the list never grows past the ceiling. A finished upload releases its slot
//! explicitly; a leaked slot expires with the window, and
//! [`UploadAdmissionLimiter::purge_expired`] drops origins whose slots have
//! all expired. An origin is only tracked while it holds at least one slot.
//!
//! ```rust
//! use std::time::Duration;
//! use glyphcast::limiter::UploadAdmissionLimiter;
//!
//! let limiter = UploadAdmissionLimiter::new(2, Duration::from_secs(3600));
//! assert!(limiter.try_admit("10.0.0.1"));
//! assert!(limiter.try_admit("10.0.0.1"));
//! assert!(!limiter.try_admit("10.0.0.1"));
//!
//! limiter.release("10.0.0.1");
//! assert!(limiter.try_admit("10.0.0.1"));
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::debug;

/// Default number of concurrent uploads per origin.
pub const DEFAULT_CEILING: usize = 3;

/// Default admission window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Per-origin sliding-window admission counter.
///
/// Admission and release for one origin are serialized by the map's shard
/// lock; different origins proceed independently.
#[derive(Debug)]
pub struct UploadAdmissionLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    ceiling: usize,
    window: Duration,
}

impl Default for UploadAdmissionLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING, DEFAULT_WINDOW)
    }
}

impl UploadAdmissionLimiter {
    pub fn new(ceiling: usize, window: Duration) -> Self {
        Self { windows: DashMap::new(), ceiling, window }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit one upload from `origin` if it is below the ceiling.
    pub fn try_admit(&self, origin: &str) -> bool {
        let now = Instant::now();

        match self.windows.entry(origin.to_string()) {
            Entry::Occupied(mut entry) => {
                let slots = entry.get_mut();
                self.prune(slots, now);

                if slots.len() < self.ceiling {
                    slots.push_back(now);
                    debug!("Admitted upload from {} ({}/{})", origin, slots.len(), self.ceiling);
                    true
                } else {
                    debug!("Rejected upload from {}: {} uploads in window", origin, slots.len());
                    if slots.is_empty() {
                        entry.remove();
                    }
                    false
                }
            }
            Entry::Vacant(entry) => {
                if self.ceiling == 0 {
                    debug!("Rejected upload from {}: uploads disabled", origin);
                    return false;
                }
                entry.insert(VecDeque::from([now]));
                debug!("Admitted upload from {} (1/{})", origin, self.ceiling);
                true
            }
        }
    }

    /// Drop origins whose admissions have all left the window. Returns how
    /// many origins were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, slots| {
            self.prune(slots, now);
            !slots.is_empty()
        });

        let purged = before.saturating_sub(self.windows.len());
        if purged > 0 {
            debug!("Purged {} idle upload origins", purged);
        }
        purged
    }

    fn prune(&self, slots: &mut VecDeque<Instant>, now: Instant) {
        while slots.front().is_some_and(|&at| now.duration_since(at) >= self.window) {
            slots.pop_front();
        }
    }

    /// Release the oldest admission recorded for `origin`. No-op when none remain.
    pub fn release(&self, origin: &str) {
        if let Entry::Occupied(mut entry) = self.windows.entry(origin.to_string()) {
            entry.get_mut().pop_front();
            if entry.get().is_empty() {
                entry.remove();
            }
            debug!("Released upload slot for {}", origin);
        }
    }

    /// Admit and wrap the slot in a guard that releases it on drop.
    pub fn admit(self: &Arc<Self>, origin: &str) -> Option<UploadPermit> {
        self.try_admit(origin)
            .then(|| UploadPermit { limiter: Arc::clone(self), origin: origin.to_string() })
    }

    /// Admissions currently counted for `origin`, including expired ones not yet pruned.
    pub fn in_flight(&self, origin: &str) -> usize {
        self.windows.get(origin).map_or(0, |slots| slots.len())
    }

    /// Number of origins currently tracked.
    pub fn tracked_origins(&self) -> usize {
        self.windows.len()
    }
}

/// An admitted upload slot. Dropping it releases the slot, on success and
/// failure alike.
#[derive(Debug)]
pub struct UploadPermit {
    limiter: Arc<UploadAdmissionLimiter>,
    origin: String,
}

impl UploadPermit {
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl Drop for UploadPermit {
    fn drop(&mut self) {
        self.limiter.release(&self.origin);
    }
}
