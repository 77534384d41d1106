//! Ingestion channel traits
//!
//! Decouple producers and the ingestion worker from the concrete container
//! (bounded queue, ring buffer) that carries updates to the engine.

use crate::{ContractError, MarketUpdate};

/// What happened to an offered update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Enqueued without loss
    Accepted,
    /// Enqueued after evicting the oldest buffered update
    EvictedOldest,
    /// Channel full, the offered update was discarded
    DroppedNewest,
}

impl Offer {
    /// True if some update was lost to make this offer
    pub fn lost_update(&self) -> bool {
        !matches!(self, Self::Accepted)
    }
}

/// Producer end of an ingestion channel
#[trait_variant::make(UpdateProducer: Send)]
pub trait LocalUpdateProducer {
    /// Channel name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Offer one update, applying the channel's overflow policy.
    ///
    /// Only the blocking policy ever waits.
    ///
    /// # Errors
    /// `ChannelClosed` once the consumer side is gone.
    async fn offer(&mut self, update: MarketUpdate) -> Result<Offer, ContractError>;
}

/// Consumer end of an ingestion channel
///
/// # Example
///
/// ```ignore
/// while let Some(update) = source.recv().await {
///     engine.submit(update)?;
/// }
/// ```
#[trait_variant::make(UpdateSource: Send)]
pub trait LocalUpdateSource {
    /// Channel name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Wait for the next update; `None` once every producer is gone and the
    /// buffer is drained
    async fn recv(&mut self) -> Option<MarketUpdate>;

    /// Next buffered update without waiting
    fn try_recv(&mut self) -> Option<MarketUpdate>;

    /// Number of updates buffered and not yet received
    fn backlog(&self) -> usize;
}
