//! Ingestion worker: drains a channel into the dispatch engine.

use std::sync::Arc;

use coalescer::DispatchEngine;
use contracts::{MarketUpdate, UpdateSource};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::IngestionMetrics;

/// Updates handled per wake-up before checking for cancellation again
const DRAIN_BATCH: usize = 256;

/// Totals reported when the worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub forwarded: u64,
    pub rejected: u64,
}

/// Handle to a spawned ingestion worker
#[derive(Debug)]
pub struct IngestionWorker {
    cancel: CancellationToken,
    handle: JoinHandle<WorkerStats>,
}

impl IngestionWorker {
    /// Spawn a worker consuming `source` until it closes or `cancel` fires
    #[instrument(name = "ingestion_worker_spawn", skip_all, fields(channel = source.name()))]
    pub fn spawn<S>(
        source: S,
        engine: Arc<DispatchEngine>,
        metrics: Arc<IngestionMetrics>,
        cancel: CancellationToken,
    ) -> Self
    where
        S: UpdateSource + 'static,
    {
        info!("starting ingestion worker");
        let handle = tokio::spawn(run(source, engine, metrics, cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancel and wait for the worker; updates still buffered are dropped
    #[instrument(name = "ingestion_worker_stop", skip(self))]
    pub async fn stop(self) -> WorkerStats {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the worker to finish on its own (channel closed)
    pub async fn join(self) -> WorkerStats {
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "ingestion worker ended abnormally");
                WorkerStats::default()
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run<S: UpdateSource>(
    mut source: S,
    engine: Arc<DispatchEngine>,
    metrics: Arc<IngestionMetrics>,
    cancel: CancellationToken,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.recv() => next,
        };
        let Some(update) = next else {
            debug!(channel = source.name(), "ingestion channel closed");
            break;
        };

        forward(&engine, &metrics, &mut stats, update);
        for _ in 0..DRAIN_BATCH {
            match source.try_recv() {
                Some(update) => forward(&engine, &metrics, &mut stats, update),
                None => break,
            }
        }
        metrics.update_queue_len(source.backlog());
    }

    info!(
        channel = source.name(),
        forwarded = stats.forwarded,
        rejected = stats.rejected,
        backlog = source.backlog(),
        "ingestion worker stopped"
    );
    stats
}

#[inline]
fn forward(
    engine: &DispatchEngine,
    metrics: &IngestionMetrics,
    stats: &mut WorkerStats,
    update: MarketUpdate,
) {
    match engine.submit(update) {
        Ok(_) => {
            stats.forwarded += 1;
            metrics.record_forwarded();
        }
        Err(e) => {
            stats.rejected += 1;
            metrics.record_rejected();
            debug!(error = %e, "update rejected by engine");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use contracts::{ContractError, OverflowPolicy, PublishSink, ThrottleConfig};
    use parking_lot::Mutex;

    use super::*;
    use crate::channel::bounded_channel;

    #[derive(Default)]
    struct CollectingSink {
        delivered: Mutex<Vec<MarketUpdate>>,
    }

    impl PublishSink for CollectingSink {
        fn name(&self) -> &str {
            "collect"
        }

        fn publish(&self, update: &MarketUpdate) -> Result<(), ContractError> {
            self.delivered.lock().push(update.clone());
            Ok(())
        }
    }

    fn engine() -> (Arc<DispatchEngine>, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let engine = Arc::new(DispatchEngine::new(ThrottleConfig::default(), sink.clone()));
        (engine, sink)
    }

    #[tokio::test]
    async fn test_worker_forwards_until_closed() {
        let (engine, sink) = engine();
        let metrics = Arc::new(IngestionMetrics::new());
        let (producer, source) =
            bounded_channel("in", 16, OverflowPolicy::DropNewest, metrics.clone());

        producer.try_offer(MarketUpdate::new("AAPL", 1.0, 0)).unwrap();
        producer.try_offer(MarketUpdate::new("", 1.0, 0)).unwrap();
        producer.try_offer(MarketUpdate::new("BTC", 2.0, 0)).unwrap();
        drop(producer);

        let worker = IngestionWorker::spawn(source, engine, metrics.clone(), CancellationToken::new());
        let stats = worker.join().await;

        assert_eq!(stats, WorkerStats { forwarded: 2, rejected: 1 });
        assert_eq!(sink.delivered.lock().len(), 2);
        assert_eq!(metrics.snapshot().updates_rejected, 1);
    }

    #[tokio::test]
    async fn test_worker_stops_on_cancel() {
        let (engine, _sink) = engine();
        let metrics = Arc::new(IngestionMetrics::new());
        let (_producer, source) =
            bounded_channel("in", 16, OverflowPolicy::DropNewest, metrics.clone());

        let worker = IngestionWorker::spawn(source, engine, metrics, CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!worker.is_finished());

        let stats = worker.stop().await;
        assert_eq!(stats.forwarded, 0);
    }
}
