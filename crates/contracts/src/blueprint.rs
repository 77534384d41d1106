//! ServiceBlueprint - Config Loader output
//!
//! Describes the whole service: throttle limits, ingestion channel, optional
//! mock feed, and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Dispatch throttle limits
    #[serde(default)]
    #[validate(nested)]
    pub throttle: ThrottleConfig,

    /// Ingestion channel selection
    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    /// Mock tick feed (demo / soak runs)
    #[serde(default)]
    pub feed: Option<FeedConfig>,

    /// Output routing
    pub sinks: Vec<SinkConfig>,
}

/// Dispatch engine limits, fixed for the engine's lifetime
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ThrottleConfig {
    /// Maximum dispatches per global window, across all symbols
    #[serde(default = "default_max_global_rate")]
    #[validate(range(min = 1))]
    pub max_global_rate: u32,

    /// Global rolling window length (ms)
    #[serde(default = "default_global_window_ms")]
    #[validate(range(min = 1))]
    pub global_window_ms: u64,

    /// Minimum interval between two dispatches of one symbol (ms)
    #[serde(default = "default_symbol_cooldown_ms")]
    #[validate(range(min = 1))]
    pub symbol_cooldown_ms: u64,

    /// Flush scheduler period (ms)
    #[serde(default = "default_flush_interval_ms")]
    #[validate(range(min = 1))]
    pub flush_interval_ms: u64,

    /// Attempt a dispatch on every arrival, not only on flush ticks
    #[serde(default = "default_true")]
    pub immediate_dispatch: bool,

    /// What to do with a value whose sink call failed
    #[serde(default)]
    pub sink_failure_policy: SinkFailurePolicy,
}

fn default_max_global_rate() -> u32 {
    100
}

fn default_global_window_ms() -> u64 {
    1000
}

fn default_symbol_cooldown_ms() -> u64 {
    1000
}

fn default_flush_interval_ms() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_global_rate: default_max_global_rate(),
            global_window_ms: default_global_window_ms(),
            symbol_cooldown_ms: default_symbol_cooldown_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            immediate_dispatch: true,
            sink_failure_policy: SinkFailurePolicy::default(),
        }
    }
}

impl ThrottleConfig {
    /// Global window as a Duration
    pub fn global_window(&self) -> Duration {
        Duration::from_millis(self.global_window_ms)
    }

    /// Per-symbol cooldown as a Duration
    pub fn symbol_cooldown(&self) -> Duration {
        Duration::from_millis(self.symbol_cooldown_ms)
    }

    /// Flush period as a Duration
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Handling of a value whose sink call returned an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkFailurePolicy {
    /// Count the value as delivered; the failure is only reported
    #[default]
    TreatAsDelivered,
    /// Put the value back (unless a newer one arrived) for a later tick
    Requeue,
}

/// Ingestion channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestionConfig {
    /// Container carrying updates to the engine
    #[serde(default)]
    pub channel_kind: ChannelKind,

    /// Channel capacity (updates)
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1))]
    pub capacity: usize,

    /// Policy when the channel is full
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Idle poll period for pull-style channels (ms)
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
}

fn default_capacity() -> usize {
    1024
}

fn default_poll_interval_ms() -> u64 {
    1
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            channel_kind: ChannelKind::default(),
            capacity: default_capacity(),
            overflow_policy: OverflowPolicy::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Ingestion channel implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Multi-producer bounded queue, push-driven consumer
    #[default]
    Bounded,
    /// Single-producer lock-free ring buffer, polling consumer
    RingBuffer,
}

/// Overflow policy (when the channel is full)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest buffered update
    #[default]
    DropOldest,
    /// Discard the incoming update
    DropNewest,
    /// Make the producer wait for space
    Block,
}

/// Mock tick feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Symbols to generate ticks for
    pub symbols: Vec<String>,

    /// Total ticks per second across all symbols
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Starting price for every symbol
    #[serde(default = "default_initial_price")]
    pub initial_price: f64,

    /// Relative step size of the random walk
    #[serde(default = "default_volatility")]
    pub volatility: f64,
}

fn default_rate_hz() -> f64 {
    200.0
}

fn default_initial_price() -> f64 {
    100.0
}

fn default_volatility() -> f64 {
    0.001
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    1024
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON-lines file output
    File,
    /// Network output (UDP)
    Network,
}
