//! SinkHandle - manages a sink with isolated queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, DataSink, MarketUpdate, PublishSink};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send updates to worker
    tx: mpsc::Sender<MarketUpdate>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an update for the sink (non-blocking)
    ///
    /// # Errors
    /// `SinkQueueFull` if the queue is full (update dropped), `SinkConnection`
    /// if the worker is gone.
    pub fn try_send(&self, update: MarketUpdate) -> Result<(), ContractError> {
        match self.tx.try_send(update) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(u)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    symbol = %u.symbol,
                    "Queue full, update dropped"
                );
                Err(ContractError::SinkQueueFull {
                    sink_name: self.name.clone(),
                    symbol: u.symbol.to_string(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                Err(ContractError::SinkConnection {
                    sink_name: self.name.clone(),
                    message: "worker closed".to_string(),
                })
            }
        }
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Updates already queued are written before the sink is flushed and closed.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

impl PublishSink for SinkHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, update: &MarketUpdate) -> Result<(), ContractError> {
        self.try_send(update.clone())
    }
}

/// Worker task that consumes updates and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<MarketUpdate>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(update) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&update).await {
            Ok(()) => {
                metrics.inc_write_count();
                observability::record_sink_delivery(&name, true);
            }
            Err(e) => {
                metrics.inc_failure_count();
                observability::record_sink_delivery(&name, false);
                error!(
                    sink = %name,
                    symbol = %update.symbol,
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
