//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `MarketUpdate::observed_at` is wall-clock epoch milliseconds set by the producer
//! - Throttle decisions use the monotonic clock of the engine, never `observed_at`

mod blueprint;
mod error;
mod outcome;
mod sink;
mod source;
mod symbol;
mod update;

pub use blueprint::*;
pub use error::*;
pub use outcome::DispatchOutcome;
pub use sink::*;
pub use source::{LocalUpdateProducer, LocalUpdateSource, Offer, UpdateProducer, UpdateSource};
pub use symbol::Symbol;
pub use update::{epoch_millis, MarketUpdate};
