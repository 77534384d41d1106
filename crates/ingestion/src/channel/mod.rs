//! Ingestion channels
//!
//! Two interchangeable containers between producers and the engine, picked by
//! `IngestionConfig::channel_kind`.

mod bounded;
mod ring_buffer;

use std::sync::Arc;

use contracts::{ChannelKind, ContractError, IngestionConfig, MarketUpdate, Offer};
use contracts::{UpdateProducer, UpdateSource};
use tracing::info;

pub use bounded::{bounded_channel, BoundedProducer, BoundedSource};
pub use ring_buffer::{ring_buffer_channel, RingProducer, RingSource};

use crate::config::IngestionMetrics;
use crate::error::Result;

/// Producer end of whichever channel the config selected
pub enum ChannelProducer {
    Bounded(BoundedProducer),
    RingBuffer(RingProducer),
}

/// Consumer end of whichever channel the config selected
pub enum ChannelSource {
    Bounded(BoundedSource),
    RingBuffer(RingSource),
}

/// Build the channel described by `config`
///
/// # Errors
/// `UnsupportedPolicy` if the container cannot honour the overflow policy.
pub fn build_channel(
    name: &str,
    config: &IngestionConfig,
    metrics: Arc<IngestionMetrics>,
) -> Result<(ChannelProducer, ChannelSource)> {
    info!(
        channel = name,
        kind = ?config.channel_kind,
        capacity = config.capacity,
        overflow = ?config.overflow_policy,
        "building ingestion channel"
    );

    match config.channel_kind {
        ChannelKind::Bounded => {
            let (producer, source) =
                bounded_channel(name, config.capacity, config.overflow_policy, metrics);
            Ok((
                ChannelProducer::Bounded(producer),
                ChannelSource::Bounded(source),
            ))
        }
        ChannelKind::RingBuffer => {
            let (producer, source) = ring_buffer_channel(
                name,
                config.capacity,
                config.overflow_policy,
                std::time::Duration::from_millis(config.poll_interval_ms),
                metrics,
            )?;
            Ok((
                ChannelProducer::RingBuffer(producer),
                ChannelSource::RingBuffer(source),
            ))
        }
    }
}

impl UpdateProducer for ChannelProducer {
    fn name(&self) -> &str {
        match self {
            Self::Bounded(p) => p.name(),
            Self::RingBuffer(p) => p.name(),
        }
    }

    async fn offer(&mut self, update: MarketUpdate) -> std::result::Result<Offer, ContractError> {
        match self {
            Self::Bounded(p) => p.offer(update).await,
            Self::RingBuffer(p) => p.offer(update).await,
        }
    }
}

impl UpdateSource for ChannelSource {
    fn name(&self) -> &str {
        match self {
            Self::Bounded(s) => s.name(),
            Self::RingBuffer(s) => s.name(),
        }
    }

    async fn recv(&mut self) -> Option<MarketUpdate> {
        match self {
            Self::Bounded(s) => s.recv().await,
            Self::RingBuffer(s) => s.recv().await,
        }
    }

    fn try_recv(&mut self) -> Option<MarketUpdate> {
        match self {
            Self::Bounded(s) => s.try_recv(),
            Self::RingBuffer(s) => s.try_recv(),
        }
    }

    fn backlog(&self) -> usize {
        match self {
            Self::Bounded(s) => s.backlog(),
            Self::RingBuffer(s) => s.backlog(),
        }
    }
}
