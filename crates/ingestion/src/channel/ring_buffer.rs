//! Lock-free single-producer ring buffer (ringbuf `HeapRb`)
//!
//! Pull-driven: the consumer polls, sleeping `poll_interval` whenever the
//! buffer is empty. The producer cannot touch the read side, so drop-oldest is
//! not available; a full buffer either discards the new update or waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, MarketUpdate, Offer, OverflowPolicy, UpdateProducer, UpdateSource};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use tracing::trace;

use crate::config::{policy_label, IngestionMetrics};
use crate::error::{IngestionError, Result};

/// Liveness flags shared by both ends
#[derive(Debug, Default)]
struct Liveness {
    producer_gone: AtomicBool,
    consumer_gone: AtomicBool,
}

/// Create a ring buffer channel
///
/// # Errors
/// `UnsupportedPolicy` for `DropOldest`.
pub fn ring_buffer_channel(
    name: &str,
    capacity: usize,
    policy: OverflowPolicy,
    poll_interval: Duration,
    metrics: Arc<IngestionMetrics>,
) -> Result<(RingProducer, RingSource)> {
    if policy == OverflowPolicy::DropOldest {
        return Err(IngestionError::UnsupportedPolicy {
            channel: name.to_string(),
            policy,
        });
    }

    let (prod, cons) = HeapRb::<MarketUpdate>::new(capacity.max(1)).split();
    let name: Arc<str> = Arc::from(name);
    let liveness = Arc::new(Liveness::default());

    let producer = RingProducer {
        name: name.clone(),
        prod,
        policy,
        liveness: liveness.clone(),
        metrics: metrics.clone(),
    };
    let source = RingSource {
        name,
        cons,
        poll_interval,
        liveness,
        metrics,
    };
    Ok((producer, source))
}

/// The single producer
pub struct RingProducer {
    name: Arc<str>,
    prod: HeapProd<MarketUpdate>,
    policy: OverflowPolicy,
    liveness: Arc<Liveness>,
    metrics: Arc<IngestionMetrics>,
}

impl RingProducer {
    /// Offer without awaiting; `Block` spins on the current thread.
    pub fn try_offer(&mut self, update: MarketUpdate) -> std::result::Result<Offer, ContractError> {
        self.metrics.record_received();
        observability::record_update_received(&self.name);

        let mut update = update;
        loop {
            self.ensure_consumer()?;
            match self.prod.try_push(update) {
                Ok(()) => return Ok(Offer::Accepted),
                Err(back) if self.policy == OverflowPolicy::Block => {
                    update = back;
                    std::thread::yield_now();
                }
                Err(dropped) => return Ok(self.drop_newest(&dropped)),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.prod.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.prod.is_empty()
    }

    fn ensure_consumer(&self) -> std::result::Result<(), ContractError> {
        if self.liveness.consumer_gone.load(Ordering::Acquire) {
            return Err(ContractError::channel_closed(self.name.as_ref()));
        }
        Ok(())
    }

    fn drop_newest(&self, dropped: &MarketUpdate) -> Offer {
        self.metrics.record_dropped();
        observability::record_update_dropped(&self.name, policy_label(self.policy));
        trace!(channel = %self.name, symbol = %dropped.symbol, "update dropped (newest)");
        Offer::DroppedNewest
    }
}

impl UpdateProducer for RingProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn offer(&mut self, update: MarketUpdate) -> std::result::Result<Offer, ContractError> {
        if self.policy != OverflowPolicy::Block {
            return self.try_offer(update);
        }

        self.metrics.record_received();
        observability::record_update_received(&self.name);

        let mut update = update;
        loop {
            self.ensure_consumer()?;
            match self.prod.try_push(update) {
                Ok(()) => return Ok(Offer::Accepted),
                Err(back) => {
                    update = back;
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}

impl Drop for RingProducer {
    fn drop(&mut self) {
        self.liveness.producer_gone.store(true, Ordering::Release);
    }
}

/// The single consumer
pub struct RingSource {
    name: Arc<str>,
    cons: HeapCons<MarketUpdate>,
    poll_interval: Duration,
    liveness: Arc<Liveness>,
    metrics: Arc<IngestionMetrics>,
}

impl UpdateSource for RingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv(&mut self) -> Option<MarketUpdate> {
        loop {
            // Read the flag before popping so a final push is never missed.
            let producer_gone = self.liveness.producer_gone.load(Ordering::Acquire);
            if let Some(update) = self.cons.try_pop() {
                self.metrics.update_queue_len(self.cons.occupied_len());
                return Some(update);
            }
            if producer_gone {
                return None;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn try_recv(&mut self) -> Option<MarketUpdate> {
        self.cons.try_pop()
    }

    fn backlog(&self) -> usize {
        self.cons.occupied_len()
    }
}

impl Drop for RingSource {
    fn drop(&mut self) {
        self.liveness.consumer_gone.store(true, Ordering::Release);
    }
}
