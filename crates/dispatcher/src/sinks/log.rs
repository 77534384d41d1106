//! LogSink - logs published updates via tracing

use contracts::{ContractError, DataSink, MarketUpdate};
use tracing::{info, instrument};

/// Sink that logs every published update, for debugging and demos
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_update(&self, update: &MarketUpdate) {
        info!(
            sink = %self.name,
            symbol = %update.symbol,
            price = update.price,
            observed_at = update.observed_at,
            "MarketUpdate published"
        );
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, update),
        fields(sink = %self.name, symbol = %update.symbol)
    )]
    async fn write(&mut self, update: &MarketUpdate) -> Result<(), ContractError> {
        self.log_update(update);
        self.written += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, written = self.written, "LogSink closed");
        Ok(())
    }
}
