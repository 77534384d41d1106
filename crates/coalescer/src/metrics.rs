//! Engine counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::DispatchOutcome;

/// In-process counters of one dispatch engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Updates accepted into the store
    received: AtomicU64,
    /// Updates rejected as malformed
    rejected: AtomicU64,
    /// Pending values overwritten before dispatch
    coalesced: AtomicU64,
    dispatched: AtomicU64,
    deferred_global: AtomicU64,
    deferred_cooldown: AtomicU64,
    no_value: AtomicU64,
    /// Sink calls that returned an error
    sink_failures: AtomicU64,
    /// Flush ticks that panicked
    tick_panics: AtomicU64,
    /// Flush ticks completed
    ticks: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one decision outcome
    pub fn record_outcome(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Dispatched => &self.dispatched,
            DispatchOutcome::DeferredGlobal => &self.deferred_global,
            DispatchOutcome::DeferredCooldown => &self.deferred_cooldown,
            DispatchOutcome::NoValue => &self.no_value,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sink_failures(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tick_panics(&self) {
        self.tick_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            dispatched: self.dispatched(),
            deferred_global: self.deferred_global.load(Ordering::Relaxed),
            deferred_cooldown: self.deferred_cooldown.load(Ordering::Relaxed),
            no_value: self.no_value.load(Ordering::Relaxed),
            sink_failures: self.sink_failures(),
            tick_panics: self.tick_panics.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub received: u64,
    pub rejected: u64,
    pub coalesced: u64,
    pub dispatched: u64,
    pub deferred_global: u64,
    pub deferred_cooldown: u64,
    pub no_value: u64,
    pub sink_failures: u64,
    pub tick_panics: u64,
    pub ticks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_counted_separately() {
        let metrics = EngineMetrics::new();
        metrics.record_outcome(DispatchOutcome::Dispatched);
        metrics.record_outcome(DispatchOutcome::DeferredGlobal);
        metrics.record_outcome(DispatchOutcome::DeferredGlobal);
        metrics.record_outcome(DispatchOutcome::NoValue);

        let snap = metrics.snapshot();
        assert_eq!(snap.dispatched, 1);
        assert_eq!(snap.deferred_global, 2);
        assert_eq!(snap.deferred_cooldown, 0);
        assert_eq!(snap.no_value, 1);
    }
}
