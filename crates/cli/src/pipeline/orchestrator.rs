//! Service orchestrator - wires feed, ingestion, engine, scheduler and sinks.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use coalescer::{DispatchEngine, FlushScheduler};
use contracts::{PublishSink, ServiceBlueprint};
use ingestion::{build_channel, IngestionMetrics, IngestionWorker, MockTickFeed, WorkerStats};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{PipelineStats, RecordingSink};

/// Time allowed for the worker to drain the channel once the feed stops
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Service configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The validated service blueprint
    pub blueprint: ServiceBlueprint,

    /// Run time (None = until shutdown signal)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main service orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `duration` elapses or `shutdown` resolves, then stop in order:
    /// feed, ingestion worker, flush scheduler, sinks.
    ///
    /// Values still pending when the scheduler stops are not flushed.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Setup Dispatcher
        info!("Setting up dispatcher...");
        let dispatcher = Arc::new(
            dispatcher::create_dispatcher(blueprint.sinks.clone())
                .await
                .context("Failed to create dispatcher")?,
        );
        let recorder = RecordingSink::new(dispatcher.clone() as Arc<dyn PublishSink>);
        let aggregator = recorder.aggregator();

        // Setup Engine + Scheduler
        let engine = Arc::new(DispatchEngine::new(
            blueprint.throttle.clone(),
            Arc::new(recorder),
        ));
        info!(
            max_global_rate = blueprint.throttle.max_global_rate,
            global_window_ms = blueprint.throttle.global_window_ms,
            symbol_cooldown_ms = blueprint.throttle.symbol_cooldown_ms,
            immediate_dispatch = blueprint.throttle.immediate_dispatch,
            "Dispatch engine configured"
        );
        let cancel = CancellationToken::new();
        let scheduler = FlushScheduler::start_with_token(engine.clone(), cancel.child_token());

        // Setup Ingestion
        info!("Setting up ingestion...");
        let ingestion_metrics = Arc::new(IngestionMetrics::new());
        let (producer, source) =
            build_channel("ticks", &blueprint.ingestion, ingestion_metrics.clone())
                .context("Failed to build ingestion channel")?;
        let worker = IngestionWorker::spawn(
            source,
            engine.clone(),
            ingestion_metrics.clone(),
            cancel.child_token(),
        );

        // Start Feed
        let feed = match &blueprint.feed {
            Some(feed_config) => {
                let feed = MockTickFeed::new(feed_config.clone())
                    .context("Invalid feed configuration")?;
                let task = feed.start(producer).context("Failed to start feed")?;
                info!(
                    symbols = feed_config.symbols.len(),
                    rate_hz = feed_config.rate_hz,
                    "Mock tick feed started"
                );
                Some((feed, task))
            }
            None => {
                warn!("No feed configured - nothing will be ingested");
                drop(producer);
                None
            }
        };

        info!("Service running");
        match self.config.duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => info!("Run duration elapsed"),
                    _ = shutdown => warn!("Received shutdown signal"),
                }
            }
            None => {
                shutdown.await;
                warn!("Received shutdown signal");
            }
        }

        // Shutdown
        info!("Shutting down...");
        let mut ticks_generated = 0;
        if let Some((feed, task)) = feed {
            feed.stop();
            match task.await {
                Ok(sent) => ticks_generated = sent,
                Err(e) => warn!(error = %e, "Feed task ended abnormally"),
            }
        }

        let worker_stats = drain_worker(worker, &cancel).await;
        cancel.cancel();
        scheduler.stop().await;

        let pending_at_exit = engine.occupancy(tokio::time::Instant::now()).pending;
        let engine_snapshot = engine.metrics().snapshot();
        drop(engine);

        let sinks = match Arc::try_unwrap(dispatcher) {
            Ok(dispatcher) => dispatcher.shutdown().await,
            Err(shared) => {
                warn!("Dispatcher still shared, sink queues not drained");
                shared.metrics()
            }
        };

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            ticks_generated,
            ingestion: ingestion_metrics.snapshot(),
            worker: worker_stats,
            engine: engine_snapshot,
            sinks,
            dispatch: aggregator.lock().summary(),
            pending_at_exit,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            published = stats.engine.dispatched,
            pending_at_exit,
            "Service shutdown complete"
        );

        Ok(stats)
    }
}

/// Let the worker finish the backlog, cancelling it if it takes too long
async fn drain_worker(worker: IngestionWorker, cancel: &CancellationToken) -> WorkerStats {
    let stopper = cancel.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        warn!("Ingestion drain timed out, cancelling worker");
        stopper.cancel();
    });
    let stats = worker.join().await;
    timer.abort();
    stats
}
