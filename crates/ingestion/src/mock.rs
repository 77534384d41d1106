//! Mock 行情源
//!
//! 随机游走价格生成器，用于演示和无真实行情环境的测试。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{FeedConfig, MarketUpdate, Symbol, UpdateProducer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::error::{IngestionError, Result};

/// Mock 行情源
///
/// 以 `rate_hz` 的总频率为随机选中的 symbol 生成行情。
pub struct MockTickFeed {
    config: FeedConfig,
    seed: Option<u64>,
    running: Arc<AtomicBool>,
    ticks_sent: Arc<AtomicU64>,
}

impl MockTickFeed {
    /// 创建新的 Mock 行情源
    ///
    /// # Errors
    /// 没有 symbol，或频率/初始价格不为正。
    pub fn new(config: FeedConfig) -> Result<Self> {
        if config.symbols.is_empty() {
            return Err(IngestionError::InvalidFeed {
                message: "no symbols".to_string(),
            });
        }
        if !(config.rate_hz.is_finite() && config.rate_hz > 0.0) {
            return Err(IngestionError::InvalidFeed {
                message: format!("rate_hz must be > 0, got {}", config.rate_hz),
            });
        }
        if !(config.initial_price.is_finite() && config.initial_price > 0.0) {
            return Err(IngestionError::InvalidFeed {
                message: format!("initial_price must be > 0, got {}", config.initial_price),
            });
        }

        Ok(Self {
            config,
            seed: None,
            running: Arc::new(AtomicBool::new(false)),
            ticks_sent: Arc::new(AtomicU64::new(0)),
        })
    }

    /// 固定随机种子（可复现的测试）
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 启动行情源，向 `producer` 推送行情
    ///
    /// 通道关闭或调用 `stop` 后任务结束，返回已发送的行情数。
    pub fn start<P>(&self, mut producer: P) -> Result<JoinHandle<u64>>
    where
        P: UpdateProducer + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyRunning {
                feed: producer.name().to_string(),
            });
        }

        let config = self.config.clone();
        let running = self.running.clone();
        let ticks_sent = self.ticks_sent.clone();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(tokio::spawn(async move {
            let symbols: Vec<Symbol> = config.symbols.iter().map(|s| Symbol::new(s)).collect();
            let mut prices = vec![config.initial_price; symbols.len()];
            let period = Duration::from_secs_f64(1.0 / config.rate_hz).max(Duration::from_micros(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            let mut sent: u64 = 0;

            debug!(
                symbols = symbols.len(),
                rate_hz = config.rate_hz,
                "mock tick feed started"
            );

            while running.load(Ordering::Relaxed) {
                ticker.tick().await;

                let idx = rng.random_range(0..symbols.len());
                let step: f64 = rng.random_range(-1.0..=1.0) * config.volatility;
                prices[idx] = (prices[idx] * (1.0 + step)).max(f64::MIN_POSITIVE);

                let update = MarketUpdate::now(symbols[idx].clone(), prices[idx]);
                if producer.offer(update).await.is_err() {
                    debug!("mock feed channel closed");
                    break;
                }
                sent += 1;
                ticks_sent.fetch_add(1, Ordering::Relaxed);
                trace!(symbol = %symbols[idx], price = prices[idx], "mock tick sent");
            }

            running.store(false, Ordering::SeqCst);
            debug!(sent, "mock tick feed stopped");
            sent
        }))
    }

    /// 停止行情源
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// 已发送行情数
    pub fn ticks_sent(&self) -> u64 {
        self.ticks_sent.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::bounded_channel;
    use crate::config::IngestionMetrics;
    use contracts::{OverflowPolicy, UpdateSource};

    fn feed_config(symbols: &[&str]) -> FeedConfig {
        FeedConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            rate_hz: 1000.0,
            initial_price: 100.0,
            volatility: 0.01,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_generates_valid_ticks() {
        let (producer, mut source) = bounded_channel(
            "feed",
            64,
            OverflowPolicy::Block,
            Arc::new(IngestionMetrics::new()),
        );
        let feed = MockTickFeed::new(feed_config(&["AAPL", "BTC"]))
            .unwrap()
            .with_seed(7);
        let handle = feed.start(producer).unwrap();

        for _ in 0..20 {
            let update = source.recv().await.unwrap();
            assert!(update.validate().is_ok());
            assert!(update.symbol == "AAPL" || update.symbol == "BTC");
            assert!(update.price > 50.0 && update.price < 150.0);
        }

        feed.stop();
        drop(source);
        let sent = handle.await.unwrap();
        assert!(sent >= 20);
        assert!(!feed.is_running());
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (producer, _source) = bounded_channel(
            "feed",
            4,
            OverflowPolicy::DropNewest,
            Arc::new(IngestionMetrics::new()),
        );
        let feed = MockTickFeed::new(feed_config(&["AAPL"])).unwrap();
        let _handle = feed.start(producer.clone()).unwrap();

        let err = feed.start(producer).unwrap_err();
        assert!(matches!(err, IngestionError::AlreadyRunning { .. }));
        feed.stop();
    }

    #[test]
    fn test_invalid_config() {
        assert!(MockTickFeed::new(feed_config(&[])).is_err());

        let mut config = feed_config(&["AAPL"]);
        config.rate_hz = 0.0;
        assert!(MockTickFeed::new(config).is_err());
    }
}
