//! MarketUpdate - Ingestion input
//!
//! One tick for one symbol.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{ContractError, Symbol};

/// Market data update
///
/// Immutable once produced; the engine only ever moves it from the store to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketUpdate {
    /// Instrument symbol (coalescing key)
    pub symbol: Symbol,

    /// Last traded / quoted price
    pub price: f64,

    /// Producer wall-clock time (epoch milliseconds)
    pub observed_at: u64,
}

impl MarketUpdate {
    /// Create an update with an explicit observation time
    pub fn new(symbol: impl Into<Symbol>, price: f64, observed_at: u64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            observed_at,
        }
    }

    /// Create an update stamped with the current wall-clock time
    pub fn now(symbol: impl Into<Symbol>, price: f64) -> Self {
        Self::new(symbol, price, epoch_millis())
    }

    /// Reject updates that must never enter the store.
    ///
    /// # Errors
    /// `MalformedUpdate` for a blank symbol or a non-finite price.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.symbol.is_blank() {
            return Err(ContractError::malformed_update(
                self.symbol.as_str(),
                "symbol must not be empty",
            ));
        }
        if !self.price.is_finite() {
            return Err(ContractError::malformed_update(
                self.symbol.as_str(),
                format!("price must be finite, got {}", self.price),
            ));
        }
        Ok(())
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
