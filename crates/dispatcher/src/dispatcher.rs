//! Dispatcher - fan-out of published updates to sinks

use std::sync::Arc;

use tracing::{info, instrument, trace};

use contracts::{ContractError, MarketUpdate, PublishSink, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Build the dispatcher, spawning one worker per sink
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;
        Ok(Dispatcher::with_handles(handles))
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            match create_sink_handle(sink_config).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Workers already spawned must not leak
                    Dispatcher::shutdown_handles(handles).await;
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Fans each published update out to every sink
///
/// `publish` never blocks: every sink has its own bounded queue, so a slow or
/// failing sink only loses its own copy.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        info!(sinks = handles.len(), "Dispatcher started");
        Self { handles }
    }

    /// Number of sinks
    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Drain every sink queue, then flush and close the sinks
    ///
    /// Returns the final per-sink metrics.
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(sinks = self.handles.len()))]
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        let finals = Self::shutdown_handles(self.handles).await;
        info!("Dispatcher shutdown complete");
        finals
    }

    async fn shutdown_handles(handles: Vec<SinkHandle>) -> Vec<(String, MetricsSnapshot)> {
        let mut finals = Vec::with_capacity(handles.len());
        for handle in handles {
            let name = handle.name().to_string();
            let metrics = Arc::clone(handle.metrics());
            handle.shutdown().await;
            finals.push((name, metrics.snapshot()));
        }
        finals
    }
}

impl PublishSink for Dispatcher {
    fn name(&self) -> &str {
        "dispatcher"
    }

    /// Offer the update to every sink, reporting the first refusal
    fn publish(&self, update: &MarketUpdate) -> Result<(), ContractError> {
        let mut first_err = None;
        for handle in &self.handles {
            if let Err(e) = handle.try_send(update.clone()) {
                first_err.get_or_insert(e);
            }
        }
        trace!(symbol = %update.symbol, sinks = self.handles.len(), "update fanned out");
        first_err.map_or(Ok(()), Err)
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs))]
pub async fn create_dispatcher(sink_configs: Vec<SinkConfig>) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config).build().await
}
