//! Flush scheduler.
//!
//! A cancellable tokio task that runs one flush pass over every pending symbol
//! per period. This is the only path that drains symbols deferred on arrival
//! and keeps draining after updates stop.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::DispatchEngine;

/// Handle to a running flush task
///
/// Ticks never overlap: the pass runs inline in the task between timer waits.
#[derive(Debug)]
pub struct FlushScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    /// Spawn the flush task using the engine's configured period
    pub fn start(engine: Arc<DispatchEngine>) -> Self {
        Self::start_with_token(engine, CancellationToken::new())
    }

    /// Spawn the flush task, stopping when `cancel` fires
    #[instrument(name = "flush_scheduler_start", skip(engine, cancel))]
    pub fn start_with_token(engine: Arc<DispatchEngine>, cancel: CancellationToken) -> Self {
        let period = engine.config().flush_interval();
        info!(period_ms = period.as_millis() as u64, "starting flush scheduler");

        let handle = tokio::spawn(run(engine, cancel.clone(), period));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Token that stops this scheduler when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop ticking and wait for the task to exit.
    ///
    /// A pass already in progress completes; no final flush is made and pending
    /// values stay where they are.
    #[instrument(name = "flush_scheduler_stop", skip(self))]
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "flush task ended abnormally");
            }
        }
        info!("flush scheduler stopped");
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        // Without an explicit stop the task would outlive its handle.
        self.cancel.cancel();
    }
}

async fn run(engine: Arc<DispatchEngine>, cancel: CancellationToken, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut offset = 0usize;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = catch_unwind(AssertUnwindSafe(|| engine.flush(offset)));
        match result {
            Ok(report) => {
                offset = report.next_offset;
                engine.metrics().inc_ticks();
                if report.dispatched > 0 {
                    debug!(
                        dispatched = report.dispatched,
                        deferred_cooldown = report.deferred_cooldown,
                        deferred_global = report.deferred_global + report.skipped,
                        "flush pass"
                    );
                }
            }
            Err(payload) => {
                // Skip past the symbol that blew up so it does not lead every pass.
                offset = offset.wrapping_add(1);
                engine.metrics().inc_tick_panics();
                observability::record_tick_panic();
                error!(panic = %panic_message(payload.as_ref()), "flush tick panicked");
            }
        }

        engine.occupancy(Instant::now());
    }

    debug!("flush task exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
