//! Shared throttle state.
//!
//! Everything the engine and the flush scheduler share lives here, behind one
//! `Arc`, instead of in ambient globals.

use std::collections::HashSet;

use contracts::{Symbol, ThrottleConfig};
use tokio::time::Instant;

use crate::cooldown::CooldownTracker;
use crate::retry::RetrySet;
use crate::store::LatestValueStore;
use crate::window::GlobalRateWindow;

#[derive(Debug)]
pub struct ThrottleState {
    config: ThrottleConfig,
    pub store: LatestValueStore,
    pub window: GlobalRateWindow,
    pub cooldown: CooldownTracker,
    pub retry: RetrySet,
}

impl ThrottleState {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            store: LatestValueStore::new(),
            window: GlobalRateWindow::new(
                config.max_global_rate as usize,
                config.global_window(),
            ),
            cooldown: CooldownTracker::new(config.symbol_cooldown()),
            retry: RetrySet::new(),
            config,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Symbols in store ∪ retry set, each once, sorted by name.
    ///
    /// The stable order lets the scheduler rotate its starting point between
    /// ticks.
    pub fn pending_symbols(&self) -> Vec<Symbol> {
        let mut seen = HashSet::new();
        let mut symbols: Vec<Symbol> = self
            .store
            .symbols()
            .into_iter()
            .chain(self.retry.snapshot())
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect();
        symbols.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        symbols
    }

    /// Point-in-time sizes for gauges and summaries
    pub fn occupancy(&self, now: Instant) -> StateOccupancy {
        StateOccupancy {
            pending: self.store.len(),
            retry: self.retry.len(),
            window: self.window.occupancy(now),
        }
    }
}

/// Sizes of the shared containers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateOccupancy {
    pub pending: usize,
    pub retry: usize,
    pub window: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MarketUpdate;

    #[test]
    fn test_pending_symbols_deduplicated_and_sorted() {
        let state = ThrottleState::new(ThrottleConfig::default());
        state.store.upsert(MarketUpdate::new("MSFT", 1.0, 0));
        state.store.upsert(MarketUpdate::new("AAPL", 1.0, 0));
        state.retry.insert(&Symbol::new("AAPL"));
        state.retry.insert(&Symbol::new("BTC"));

        let names: Vec<String> = state
            .pending_symbols()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["AAPL", "BTC", "MSFT"]);
    }

    #[test]
    fn test_window_sized_from_config() {
        let config = ThrottleConfig {
            max_global_rate: 7,
            ..Default::default()
        };
        let state = ThrottleState::new(config);
        assert_eq!(state.window.max_dispatches(), 7);
        assert_eq!(state.occupancy(Instant::now()), StateOccupancy::default());
    }
}
