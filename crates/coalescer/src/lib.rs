//! # Coalescer
//!
//! 合并限流分发引擎。
//!
//! 负责：
//! - 每个 symbol 只保留最新值（latest wins）
//! - 全局滚动窗口限速 + 单 symbol 冷却
//! - 被推迟的 symbol 由 flush 调度器定期重试
//!
//! ## 使用示例
//!
//! ```ignore
//! use coalescer::{DispatchEngine, FlushScheduler};
//!
//! let engine = Arc::new(DispatchEngine::new(config.throttle.clone(), sink));
//! let scheduler = FlushScheduler::start(engine.clone());
//!
//! engine.submit(MarketUpdate::now("AAPL", 189.5))?;
//!
//! scheduler.stop().await;
//! ```

mod cooldown;
mod engine;
mod metrics;
mod retry;
mod scheduler;
mod state;
mod store;
mod window;

pub use cooldown::{CooldownSlot, CooldownTracker};
pub use engine::{DispatchEngine, FlushReport};
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use retry::RetrySet;
pub use scheduler::FlushScheduler;
pub use state::{StateOccupancy, ThrottleState};
pub use store::LatestValueStore;
pub use window::GlobalRateWindow;

// Re-export contracts types
pub use contracts::{DispatchOutcome, MarketUpdate, PublishSink, Symbol, ThrottleConfig};
