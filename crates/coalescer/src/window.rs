//! Global rolling rate window.
//!
//! Records the instants of recent dispatches across every symbol and caps how
//! many may fall inside the trailing window. Stamps older than the window are
//! purged lazily on every query.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Dispatch-rate ceiling over a trailing window.
#[derive(Debug)]
pub struct GlobalRateWindow {
    max_dispatches: usize,
    window: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl GlobalRateWindow {
    pub fn new(max_dispatches: usize, window: Duration) -> Self {
        Self {
            max_dispatches,
            window,
            stamps: Mutex::new(VecDeque::with_capacity(max_dispatches)),
        }
    }

    /// Whether one more dispatch at `now` would stay under the ceiling.
    pub fn has_capacity(&self, now: Instant) -> bool {
        let mut stamps = self.stamps.lock();
        self.purge(&mut stamps, now);
        stamps.len() < self.max_dispatches
    }

    /// Claim a slot for a dispatch at `now`.
    ///
    /// Purge, check and append happen under one lock, so concurrent callers can
    /// never push the window past its ceiling. Returns `false` when full.
    pub fn try_record(&self, now: Instant) -> bool {
        let mut stamps = self.stamps.lock();
        self.purge(&mut stamps, now);
        if stamps.len() >= self.max_dispatches {
            return false;
        }
        // Keep the deque non-decreasing even if `now` was sampled before a
        // racing caller appended a later stamp.
        let stamp = stamps.back().map_or(now, |last| now.max(*last));
        stamps.push_back(stamp);
        true
    }

    /// Dispatches inside the window ending at `now`
    pub fn occupancy(&self, now: Instant) -> usize {
        let mut stamps = self.stamps.lock();
        self.purge(&mut stamps, now);
        stamps.len()
    }

    pub fn max_dispatches(&self) -> usize {
        self.max_dispatches
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    #[inline]
    fn purge(&self, stamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = stamps.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }
}
