//! Channel configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub use contracts::{ChannelKind, IngestionConfig, OverflowPolicy};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total updates offered to the channel
    pub updates_received: AtomicU64,

    /// Total updates lost to the overflow policy
    pub updates_dropped: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,

    /// Updates the engine rejected as malformed
    pub updates_rejected: AtomicU64,

    /// Updates handed to the engine
    pub updates_forwarded: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record update received
    pub fn record_received(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record update dropped
    pub fn record_dropped(&self) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record engine rejection
    pub fn record_rejected(&self) {
        self.updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record update forwarded to the engine
    pub fn record_forwarded(&self) {
        self.updates_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_received: self.updates_received.load(Ordering::Relaxed),
            updates_dropped: self.updates_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            updates_rejected: self.updates_rejected.load(Ordering::Relaxed),
            updates_forwarded: self.updates_forwarded.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Total updates offered to the channel
    pub updates_received: u64,

    /// Total updates lost to the overflow policy
    pub updates_dropped: u64,

    /// Current queue length
    pub queue_len: usize,

    /// Updates the engine rejected as malformed
    pub updates_rejected: u64,

    /// Updates handed to the engine
    pub updates_forwarded: u64,
}

/// Metric label for an overflow policy
pub(crate) fn policy_label(policy: OverflowPolicy) -> &'static str {
    match policy {
        OverflowPolicy::DropOldest => "drop_oldest",
        OverflowPolicy::DropNewest => "drop_newest",
        OverflowPolicy::Block => "block",
    }
}
