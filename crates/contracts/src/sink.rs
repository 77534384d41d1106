//! Sink traits - engine output interfaces
//!
//! `PublishSink` is what the dispatch engine calls; `DataSink` is what a
//! concrete output (log, file, network) implements behind a queue.

use std::sync::Arc;

use crate::{ContractError, MarketUpdate};

/// Synchronous publish interface used by the dispatch engine.
///
/// Called from the ingestion hot path and from the flush cadence, possibly from
/// several threads at once, so implementations must return quickly and never
/// await I/O.
pub trait PublishSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Hand one admitted update downstream
    ///
    /// # Errors
    /// Returns the sink's own failure; the engine logs it and does not retry
    /// unless configured to requeue.
    fn publish(&self, update: &MarketUpdate) -> Result<(), ContractError>;
}

impl<S: PublishSink + ?Sized> PublishSink for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn publish(&self, update: &MarketUpdate) -> Result<(), ContractError> {
        (**self).publish(update)
    }
}

/// Data output trait
///
/// All queued sink implementations must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one published update
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, update: &MarketUpdate) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
