//! Run statistics.

use std::time::Duration;

use coalescer::EngineMetricsSnapshot;
use dispatcher::MetricsSnapshot as SinkSnapshot;
use ingestion::{MetricsSnapshot as IngestionSnapshot, WorkerStats};
use observability::MetricsSummary;

/// Statistics from a service run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Ticks generated by the mock feed (0 without a feed)
    pub ticks_generated: u64,

    /// Ingestion channel counters
    pub ingestion: IngestionSnapshot,

    /// Updates the worker handed to the engine
    pub worker: WorkerStats,

    /// Dispatch engine counters
    pub engine: EngineMetricsSnapshot,

    /// Final per-sink counters
    pub sinks: Vec<(String, SinkSnapshot)>,

    /// Publish latency and per-symbol delivery
    pub dispatch: MetricsSummary,

    /// Symbols still holding an undelivered value at shutdown
    pub pending_at_exit: usize,
}

impl PipelineStats {
    /// Published updates per second
    pub fn publish_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.engine.dispatched as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of received updates absorbed by coalescing, in percent
    pub fn coalesce_ratio(&self) -> f64 {
        if self.engine.received > 0 {
            self.engine.coalesced as f64 / self.engine.received as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Tick Throttle Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks generated: {}", self.ticks_generated);
        println!("   ├─ Published: {}", self.engine.dispatched);
        println!("   ├─ Publish rate: {:.2}/s", self.publish_rate());
        println!("   └─ Pending at exit: {}", self.pending_at_exit);

        println!("\nIngestion");
        println!("   ├─ Offered: {}", self.ingestion.updates_received);
        println!("   ├─ Dropped (overflow): {}", self.ingestion.updates_dropped);
        println!("   ├─ Forwarded: {}", self.worker.forwarded);
        println!("   └─ Rejected (malformed): {}", self.worker.rejected);

        println!("\nEngine");
        println!(
            "   ├─ Coalesced: {} ({:.2}%)",
            self.engine.coalesced,
            self.coalesce_ratio()
        );
        println!("   ├─ Deferred (global): {}", self.engine.deferred_global);
        println!("   ├─ Deferred (cooldown): {}", self.engine.deferred_cooldown);
        println!("   ├─ Sink failures: {}", self.engine.sink_failures);
        println!("   ├─ Flush ticks: {}", self.engine.ticks);
        println!("   └─ Tick panics: {}", self.engine.tick_panics);

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, snap) in &self.sinks {
                println!(
                    "   ├─ {}: written={} failed={} dropped={}",
                    name, snap.write_count, snap.failure_count, snap.dropped_count
                );
            }
        }

        println!("\n{}", self.dispatch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut stats = PipelineStats {
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.coalesce_ratio(), 0.0);

        stats.engine.dispatched = 100;
        stats.engine.received = 400;
        stats.engine.coalesced = 300;
        assert_eq!(stats.publish_rate(), 50.0);
        assert_eq!(stats.coalesce_ratio(), 75.0);
    }
}
