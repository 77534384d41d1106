//! Latest-value store: at most one pending update per symbol.

use contracts::{MarketUpdate, Symbol};
use dashmap::DashMap;

/// Sharded map from symbol to the newest update not yet dispatched.
#[derive(Debug, Default)]
pub struct LatestValueStore {
    values: DashMap<Symbol, MarketUpdate>,
}

impl LatestValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the pending value for `update.symbol`.
    ///
    /// Returns the value that was replaced, if any.
    #[inline]
    pub fn upsert(&self, update: MarketUpdate) -> Option<MarketUpdate> {
        self.values.insert(update.symbol.clone(), update)
    }

    /// Remove and return the pending value.
    #[inline]
    pub fn take(&self, symbol: &str) -> Option<MarketUpdate> {
        self.values.remove(symbol).map(|(_, update)| update)
    }

    /// Put a taken value back unless a newer one arrived in the meantime.
    ///
    /// Returns `true` if the value was restored.
    pub fn restore(&self, update: MarketUpdate) -> bool {
        let mut restored = false;
        self.values.entry(update.symbol.clone()).or_insert_with(|| {
            restored = true;
            update
        });
        restored
    }

    /// Copy of the pending value
    pub fn get(&self, symbol: &str) -> Option<MarketUpdate> {
        self.values.get(symbol).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.values.contains_key(symbol)
    }

    /// Symbols currently holding a pending value
    pub fn symbols(&self) -> Vec<Symbol> {
        self.values.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every pending value
    pub fn clear(&self) {
        self.values.clear();
    }
}
