//! # Dispatcher
//!
//! 行情分发模块。
//!
//! 负责：
//! - 接收引擎放行的 `MarketUpdate`（实现 `PublishSink`）
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞热路径

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, MarketUpdate, PublishSink};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig, create_dispatcher};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink, NetworkFormat, NetworkSink, NetworkSinkConfig};
