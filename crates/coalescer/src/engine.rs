//! Dispatch decision engine.
//!
//! Admits or defers the pending value of one symbol against the global window
//! and the symbol's cooldown, and hands admitted values to the sink.

use std::sync::Arc;

use contracts::{
    epoch_millis, ContractError, DispatchOutcome, MarketUpdate, PublishSink, SinkFailurePolicy,
    Symbol, ThrottleConfig,
};
use tokio::time::Instant;
use tracing::{debug, instrument, trace, warn};

use crate::metrics::EngineMetrics;
use crate::state::{StateOccupancy, ThrottleState};

/// Result of one flush pass over the pending symbols
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Symbols the pass looked at
    pub candidates: usize,
    /// `try_dispatch` calls made
    pub attempted: usize,
    pub dispatched: usize,
    pub deferred_global: usize,
    pub deferred_cooldown: usize,
    pub no_value: usize,
    /// Symbols left for a later pass once the global window filled up
    pub skipped: usize,
    /// Where the next pass should start
    pub next_offset: usize,
}

impl FlushReport {
    fn count(&mut self, outcome: DispatchOutcome) {
        self.attempted += 1;
        match outcome {
            DispatchOutcome::Dispatched => self.dispatched += 1,
            DispatchOutcome::DeferredGlobal => self.deferred_global += 1,
            DispatchOutcome::DeferredCooldown => self.deferred_cooldown += 1,
            DispatchOutcome::NoValue => self.no_value += 1,
        }
    }
}

/// Coalescing, rate-limited dispatch engine
pub struct DispatchEngine {
    state: Arc<ThrottleState>,
    sink: Arc<dyn PublishSink>,
    metrics: Arc<EngineMetrics>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("sink", &self.sink.name())
            .field("pending", &self.state.store.len())
            .field("retry", &self.state.retry.len())
            .finish()
    }
}

impl DispatchEngine {
    /// Create an engine with fresh state
    pub fn new(config: ThrottleConfig, sink: Arc<dyn PublishSink>) -> Self {
        Self::with_state(Arc::new(ThrottleState::new(config)), sink)
    }

    /// Create an engine over existing shared state
    pub fn with_state(state: Arc<ThrottleState>, sink: Arc<dyn PublishSink>) -> Self {
        Self {
            state,
            sink,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn state(&self) -> &Arc<ThrottleState> {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ThrottleConfig {
        self.state.config()
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Accept one update from an ingestion channel.
    ///
    /// The update always overwrites the symbol's pending value. With immediate
    /// dispatch enabled one attempt is made right away and its outcome returned;
    /// otherwise `None` and the value waits for the next flush.
    ///
    /// # Errors
    /// `MalformedUpdate` if the update fails validation; the store is untouched.
    #[instrument(
        level = "trace",
        name = "engine_submit",
        skip(self, update),
        fields(symbol = %update.symbol, price = update.price)
    )]
    pub fn submit(&self, update: MarketUpdate) -> Result<Option<DispatchOutcome>, ContractError> {
        if let Err(err) = update.validate() {
            self.metrics.inc_rejected();
            observability::record_update_rejected("malformed");
            debug!(error = %err, "update rejected");
            return Err(err);
        }

        let symbol = update.symbol.clone();
        self.metrics.inc_received();
        if self.state.store.upsert(update).is_some() {
            self.metrics.inc_coalesced();
            observability::record_update_coalesced();
        }

        if !self.state.config().immediate_dispatch {
            return Ok(None);
        }
        Ok(Some(self.try_dispatch(&symbol)))
    }

    /// Attempt to dispatch the pending value of `symbol` now.
    pub fn try_dispatch(&self, symbol: &Symbol) -> DispatchOutcome {
        self.try_dispatch_at(symbol, Instant::now())
    }

    /// Attempt to dispatch the pending value of `symbol` at `now`.
    ///
    /// Decisions for one symbol are serialized on its cooldown slot, so at most
    /// one concurrent caller admits. Checks run in order: global window,
    /// cooldown, store.
    pub fn try_dispatch_at(&self, symbol: &Symbol, now: Instant) -> DispatchOutcome {
        let outcome = self.decide(symbol, now);
        self.metrics.record_outcome(outcome);
        observability::record_dispatch_outcome(outcome);
        trace!(symbol = %symbol, outcome = outcome.as_str(), "dispatch decision");
        outcome
    }

    fn decide(&self, symbol: &Symbol, now: Instant) -> DispatchOutcome {
        let state = &*self.state;
        let slot = state.cooldown.slot(symbol);
        let mut last_dispatch = slot.lock();

        if !state.window.has_capacity(now) {
            state.retry.insert(symbol);
            return DispatchOutcome::DeferredGlobal;
        }

        if !state.cooldown.is_eligible(*last_dispatch, now) {
            state.retry.insert(symbol);
            return DispatchOutcome::DeferredCooldown;
        }

        let Some(update) = state.store.take(symbol) else {
            state.retry.remove(symbol);
            return DispatchOutcome::NoValue;
        };

        // Another symbol may have taken the last slot since the capacity check.
        if !state.window.try_record(now) {
            state.store.restore(update);
            state.retry.insert(symbol);
            return DispatchOutcome::DeferredGlobal;
        }

        *last_dispatch = Some(now);
        state.retry.remove(symbol);
        self.publish(update);
        DispatchOutcome::Dispatched
    }

    /// Hand an admitted value to the sink. Called with the symbol's slot held.
    fn publish(&self, update: MarketUpdate) {
        match self.sink.publish(&update) {
            Ok(()) => {
                let latency_ms = epoch_millis().saturating_sub(update.observed_at) as f64;
                observability::record_publish_latency_ms(latency_ms);
            }
            Err(err) => {
                self.metrics.inc_sink_failures();
                observability::record_sink_failure(self.sink.name());
                warn!(
                    symbol = %update.symbol,
                    sink = self.sink.name(),
                    error = %err,
                    "sink publish failed"
                );

                if self.state.config().sink_failure_policy == SinkFailurePolicy::Requeue {
                    let symbol = update.symbol.clone();
                    if !self.state.store.restore(update) {
                        debug!(symbol = %symbol, "newer value pending, failed value discarded");
                    }
                    self.state.retry.insert(&symbol);
                }
            }
        }
    }

    /// One flush pass at the current instant
    pub fn flush(&self, start_offset: usize) -> FlushReport {
        self.flush_at(start_offset, Instant::now())
    }

    /// One flush pass: try every pending symbol once, starting at
    /// `start_offset` (modulo the number of symbols).
    ///
    /// After the first `DeferredGlobal` the remaining symbols go to the retry
    /// set without further attempts.
    pub fn flush_at(&self, start_offset: usize, now: Instant) -> FlushReport {
        let symbols = self.state.pending_symbols();
        let mut report = FlushReport {
            candidates: symbols.len(),
            ..Default::default()
        };
        if symbols.is_empty() {
            return report;
        }

        let start = start_offset % symbols.len();
        let mut order = symbols.iter().cycle().skip(start).take(symbols.len());

        for symbol in order.by_ref() {
            let outcome = self.try_dispatch_at(symbol, now);
            report.count(outcome);
            if outcome == DispatchOutcome::DeferredGlobal {
                break;
            }
        }

        for symbol in order {
            self.state.retry.insert(symbol);
            report.skipped += 1;
        }

        report.next_offset = (start + report.attempted) % symbols.len();
        if report.deferred_global > 0 {
            debug!(
                dispatched = report.dispatched,
                skipped = report.skipped,
                "global window full, flush pass cut short"
            );
        }
        report
    }

    /// Current container sizes, also published as gauges
    pub fn occupancy(&self, now: Instant) -> StateOccupancy {
        let occupancy = self.state.occupancy(now);
        observability::record_pending_keys(occupancy.pending);
        observability::record_retry_keys(occupancy.retry);
        observability::record_window_occupancy(occupancy.window);
        occupancy
    }
}
