//! # Ingestion
//!
//! Market update ingestion module.
//!
//! Responsibilities:
//! - Carry updates from producers to the dispatch engine (bounded queue or
//!   lock-free ring buffer)
//! - Apply the overflow policy when the channel is full
//! - Drain the channel into `DispatchEngine::submit`
//! - Generate mock ticks for demos and tests
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{build_channel, IngestionMetrics, IngestionWorker, MockTickFeed};
//!
//! let metrics = Arc::new(IngestionMetrics::new());
//! let (producer, source) = build_channel("ticks", &blueprint.ingestion, metrics.clone())?;
//!
//! let worker = IngestionWorker::spawn(source, engine.clone(), metrics, cancel.child_token());
//! let feed = MockTickFeed::new(feed_config)?;
//! let feed_task = feed.start(producer)?;
//!
//! // ...
//! feed.stop();
//! worker.stop().await;
//! ```

mod channel;
mod config;
mod error;
mod mock;
mod worker;

// Re-exports
pub use channel::{
    bounded_channel, build_channel, ring_buffer_channel, BoundedProducer, BoundedSource,
    ChannelProducer, ChannelSource, RingProducer, RingSource,
};
pub use config::{ChannelKind, IngestionConfig, IngestionMetrics, MetricsSnapshot, OverflowPolicy};
pub use contracts::{MarketUpdate, Offer, UpdateProducer, UpdateSource};
pub use error::{IngestionError, Result};
pub use mock::MockTickFeed;
pub use worker::{IngestionWorker, WorkerStats};
