//! Per-symbol cooldown tracker.
//!
//! Each symbol owns a slot holding its last dispatch instant. The slot's mutex
//! is also the per-key decision lock: whoever holds it is the only caller that
//! may admit a dispatch for that symbol.

use std::sync::Arc;
use std::time::Duration;

use contracts::Symbol;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Last-dispatch slot of one symbol
pub type CooldownSlot = Arc<Mutex<Option<Instant>>>;

#[derive(Debug)]
pub struct CooldownTracker {
    cooldown: Duration,
    slots: DashMap<Symbol, CooldownSlot>,
}

impl CooldownTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            slots: DashMap::new(),
        }
    }

    /// Slot for `symbol`, created on first use.
    pub fn slot(&self, symbol: &Symbol) -> CooldownSlot {
        if let Some(slot) = self.slots.get(symbol.as_str()) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(symbol.clone()).or_default().value())
    }

    /// `true` when a key last dispatched at `last` may dispatch again at `now`.
    #[inline]
    pub fn is_eligible(&self, last: Option<Instant>, now: Instant) -> bool {
        match last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    /// Time left before `symbol` may dispatch again
    pub fn remaining(&self, symbol: &str, now: Instant) -> Duration {
        self.last_dispatch(symbol)
            .map(|last| self.cooldown.saturating_sub(now.saturating_duration_since(last)))
            .unwrap_or(Duration::ZERO)
    }

    pub fn last_dispatch(&self, symbol: &str) -> Option<Instant> {
        self.slots.get(symbol).and_then(|slot| *slot.value().lock())
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Number of symbols ever seen
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
