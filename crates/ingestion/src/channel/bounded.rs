//! Bounded multi-producer channel (async-channel)
//!
//! Push-driven: the worker is woken on every arrival. Drop-oldest evicts the
//! head of the queue through a receiver clone kept by each producer.

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{ContractError, MarketUpdate, Offer, OverflowPolicy, UpdateProducer, UpdateSource};
use tracing::trace;

use crate::config::{policy_label, IngestionMetrics};

/// Create a bounded channel; a zero capacity is raised to one
pub fn bounded_channel(
    name: &str,
    capacity: usize,
    policy: OverflowPolicy,
    metrics: Arc<IngestionMetrics>,
) -> (BoundedProducer, BoundedSource) {
    let (tx, rx) = bounded(capacity.max(1));
    let name: Arc<str> = Arc::from(name);

    let producer = BoundedProducer {
        name: name.clone(),
        tx,
        evict: rx.clone(),
        policy,
        metrics: metrics.clone(),
    };
    let source = BoundedSource { name, rx, metrics };
    (producer, source)
}

/// Producer end; clone one per producer thread/task
#[derive(Clone)]
pub struct BoundedProducer {
    name: Arc<str>,
    tx: Sender<MarketUpdate>,
    /// Used only to evict under drop-oldest
    evict: Receiver<MarketUpdate>,
    policy: OverflowPolicy,
    metrics: Arc<IngestionMetrics>,
}

impl BoundedProducer {
    /// Offer without awaiting.
    ///
    /// Under `Block` this parks the calling thread until there is room, so
    /// async callers should use [`UpdateProducer::offer`] instead.
    pub fn try_offer(&self, update: MarketUpdate) -> Result<Offer, ContractError> {
        self.record_received();
        match self.policy {
            OverflowPolicy::Block => {
                self.tx
                    .send_blocking(update)
                    .map_err(|_| ContractError::channel_closed(self.name.as_ref()))?;
                Ok(Offer::Accepted)
            }
            OverflowPolicy::DropNewest => self.offer_drop_newest(update),
            OverflowPolicy::DropOldest => self.offer_drop_oldest(update),
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    fn offer_drop_newest(&self, update: MarketUpdate) -> Result<Offer, ContractError> {
        match self.tx.try_send(update) {
            Ok(()) => Ok(Offer::Accepted),
            Err(TrySendError::Full(dropped)) => {
                self.record_dropped();
                trace!(channel = %self.name, symbol = %dropped.symbol, "update dropped (newest)");
                Ok(Offer::DroppedNewest)
            }
            Err(TrySendError::Closed(_)) => Err(ContractError::channel_closed(self.name.as_ref())),
        }
    }

    fn offer_drop_oldest(&self, mut update: MarketUpdate) -> Result<Offer, ContractError> {
        let mut evicted = false;
        loop {
            match self.tx.try_send(update) {
                Ok(()) => {
                    return Ok(if evicted {
                        Offer::EvictedOldest
                    } else {
                        Offer::Accepted
                    })
                }
                Err(TrySendError::Full(back)) => {
                    update = back;
                    if let Ok(oldest) = self.evict.try_recv() {
                        evicted = true;
                        self.record_dropped();
                        trace!(channel = %self.name, symbol = %oldest.symbol, "update dropped (oldest)");
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    return Err(ContractError::channel_closed(self.name.as_ref()))
                }
            }
        }
    }

    fn record_received(&self) {
        self.metrics.record_received();
        observability::record_update_received(&self.name);
    }

    fn record_dropped(&self) {
        self.metrics.record_dropped();
        observability::record_update_dropped(&self.name, policy_label(self.policy));
    }
}

impl UpdateProducer for BoundedProducer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn offer(&mut self, update: MarketUpdate) -> Result<Offer, ContractError> {
        match self.policy {
            OverflowPolicy::Block => {
                self.record_received();
                self.tx
                    .send(update)
                    .await
                    .map_err(|_| ContractError::channel_closed(self.name.as_ref()))?;
                Ok(Offer::Accepted)
            }
            _ => self.try_offer(update),
        }
    }
}

/// Consumer end
pub struct BoundedSource {
    name: Arc<str>,
    rx: Receiver<MarketUpdate>,
    metrics: Arc<IngestionMetrics>,
}

impl BoundedSource {
    /// Stop accepting updates; producers get `ChannelClosed`
    pub fn close(&self) -> bool {
        self.rx.close()
    }
}

impl Drop for BoundedSource {
    fn drop(&mut self) {
        // Producers keep a receiver for eviction; close explicitly so they see it.
        self.rx.close();
    }
}

impl UpdateSource for BoundedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv(&mut self) -> Option<MarketUpdate> {
        let update = self.rx.recv().await.ok();
        self.metrics.update_queue_len(self.rx.len());
        update
    }

    fn try_recv(&mut self) -> Option<MarketUpdate> {
        self.rx.try_recv().ok()
    }

    fn backlog(&self) -> usize {
        self.rx.len()
    }
}
