//! Retry set: symbols whose last attempt was deferred.

use contracts::Symbol;
use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct RetrySet {
    symbols: DashSet<Symbol>,
}

impl RetrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert
    #[inline]
    pub fn insert(&self, symbol: &Symbol) {
        if !self.symbols.contains(symbol.as_str()) {
            self.symbols.insert(symbol.clone());
        }
    }

    #[inline]
    pub fn remove(&self, symbol: &str) -> bool {
        self.symbols.remove(symbol).is_some()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn snapshot(&self) -> Vec<Symbol> {
        self.symbols.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
