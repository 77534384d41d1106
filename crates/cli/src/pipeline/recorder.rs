//! Publish sink wrapper feeding the run summary.

use std::sync::Arc;

use contracts::{epoch_millis, ContractError, MarketUpdate, PublishSink};
use observability::DispatchMetricsAggregator;
use parking_lot::Mutex;

/// Forwards to the real sink and records every publish in an aggregator
pub struct RecordingSink {
    inner: Arc<dyn PublishSink>,
    aggregator: Arc<Mutex<DispatchMetricsAggregator>>,
}

impl RecordingSink {
    pub fn new(inner: Arc<dyn PublishSink>) -> Self {
        Self {
            inner,
            aggregator: Arc::new(Mutex::new(DispatchMetricsAggregator::new())),
        }
    }

    /// Shared handle to the aggregator, valid after the sink is dropped
    pub fn aggregator(&self) -> Arc<Mutex<DispatchMetricsAggregator>> {
        Arc::clone(&self.aggregator)
    }
}

impl PublishSink for RecordingSink {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn publish(&self, update: &MarketUpdate) -> Result<(), ContractError> {
        let result = self.inner.publish(update);
        let latency_ms = epoch_millis().saturating_sub(update.observed_at) as f64;
        self.aggregator
            .lock()
            .record_delivery(update.symbol.as_str(), latency_ms, result.is_ok());
        result
    }
}
