//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 节流语义场景（暂停时钟，结果确定）
//! - 通道 -> worker -> 引擎 -> dispatcher 全链路
//! - 配置驱动的装配

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use coalescer::{DispatchEngine, FlushScheduler};
    use contracts::{ContractError, MarketUpdate, PublishSink, ThrottleConfig};
    use parking_lot::Mutex;
    use tokio::time::Instant;

    /// A delivery as seen by the sink
    #[derive(Debug, Clone)]
    pub struct Delivery {
        pub at: Instant,
        pub update: MarketUpdate,
    }

    /// Sink recording every successful publish with the (paused) clock
    #[derive(Default)]
    pub struct TimedSink {
        deliveries: Mutex<Vec<Delivery>>,
        fail_first: AtomicUsize,
    }

    impl TimedSink {
        /// Refuse the first `n` publishes
        pub fn failing_first(n: usize) -> Self {
            Self {
                fail_first: AtomicUsize::new(n),
                ..Default::default()
            }
        }

        pub fn deliveries(&self) -> Vec<Delivery> {
            self.deliveries.lock().clone()
        }

        pub fn count(&self) -> usize {
            self.deliveries.lock().len()
        }

        pub fn for_symbol(&self, symbol: &str) -> Vec<Delivery> {
            self.deliveries
                .lock()
                .iter()
                .filter(|d| d.update.symbol == symbol)
                .cloned()
                .collect()
        }

        pub fn distinct_symbols(&self) -> usize {
            let mut symbols: Vec<String> = self
                .deliveries
                .lock()
                .iter()
                .map(|d| d.update.symbol.to_string())
                .collect();
            symbols.sort();
            symbols.dedup();
            symbols.len()
        }
    }

    impl PublishSink for TimedSink {
        fn name(&self) -> &str {
            "timed"
        }

        fn publish(&self, update: &MarketUpdate) -> Result<(), ContractError> {
            let refuse = self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refuse {
                return Err(ContractError::sink_write("timed", "refused"));
            }
            self.deliveries.lock().push(Delivery {
                at: Instant::now(),
                update: update.clone(),
            });
            Ok(())
        }
    }

    /// 100 per 1000 ms, 1000 ms cooldown, 10 ms flush
    pub fn reference_config() -> ThrottleConfig {
        ThrottleConfig::default()
    }

    pub fn start(
        config: ThrottleConfig,
        sink: Arc<TimedSink>,
    ) -> (Arc<DispatchEngine>, FlushScheduler) {
        let engine = Arc::new(DispatchEngine::new(config, sink));
        let scheduler = FlushScheduler::start(engine.clone());
        (engine, scheduler)
    }

    pub async fn sleep_until_ms(start: Instant, ms: u64) {
        tokio::time::sleep_until(start + Duration::from_millis(ms)).await;
    }

    /// Largest number of deliveries inside any closed window of `window` length
    pub fn max_in_window(deliveries: &[Delivery], window: Duration) -> usize {
        let mut times: Vec<Instant> = deliveries.iter().map(|d| d.at).collect();
        times.sort();
        let mut best = 0;
        let mut lo = 0;
        for hi in 0..times.len() {
            while times[hi] - times[lo] > window {
                lo += 1;
            }
            best = best.max(hi - lo + 1);
        }
        best
    }

    /// Smallest gap between consecutive deliveries
    pub fn min_gap(deliveries: &[Delivery]) -> Option<Duration> {
        deliveries
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .min()
    }
}

#[cfg(test)]
mod scenario_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{MarketUpdate, SinkFailurePolicy};
    use tokio::time::Instant;

    use crate::support::*;

    /// 500 symbols at t0: the ceiling paces them at 100 per window, nobody starves
    #[tokio::test(start_paused = true)]
    async fn test_burst_of_500_symbols() {
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(reference_config(), sink.clone());
        let start = Instant::now();

        for i in 0..500 {
            engine
                .submit(MarketUpdate::new(format!("K{i:03}"), i as f64, 0))
                .unwrap();
        }

        sleep_until_ms(start, 2000).await;
        let by_two_seconds = sink.count();
        assert!(by_two_seconds <= 200, "{by_two_seconds} delivered by 2s");
        assert!(by_two_seconds >= 100);

        sleep_until_ms(start, 5000).await;
        assert_eq!(sink.count(), 500);
        assert_eq!(sink.distinct_symbols(), 500);

        let deliveries = sink.deliveries();
        assert!(max_in_window(&deliveries, Duration::from_millis(1000)) <= 100);

        scheduler.stop().await;
    }

    /// 150 symbols at t0 on the same limits: almost all delivered within 3s
    #[tokio::test(start_paused = true)]
    async fn test_150_symbols_drain_quickly() {
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(reference_config(), sink.clone());
        let start = Instant::now();

        for i in 0..150 {
            engine
                .submit(MarketUpdate::new(format!("S{i}"), 1.0, 0))
                .unwrap();
        }

        sleep_until_ms(start, 3000).await;
        assert!(sink.count() >= 140);
        assert_eq!(engine.state().store.len(), 150 - sink.count());

        scheduler.stop().await;
    }

    /// Ten AAPL ticks 50 ms apart: first goes out at once, the last after the cooldown
    #[tokio::test(start_paused = true)]
    async fn test_aapl_coalesced_to_latest() {
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(reference_config(), sink.clone());
        let start = Instant::now();

        for i in 0..10u64 {
            sleep_until_ms(start, i * 50).await;
            engine
                .submit(MarketUpdate::new("AAPL", 150.0 + i as f64, i))
                .unwrap();
        }

        sleep_until_ms(start, 2000).await;
        let aapl = sink.for_symbol("AAPL");
        assert!(aapl.len() <= 2);
        assert_eq!(aapl.last().map(|d| d.update.price), Some(159.0));
        assert!(min_gap(&aapl).is_none_or(|gap| gap >= Duration::from_millis(1000)));

        scheduler.stop().await;
    }

    /// BTC 100.0 then 105.5 within 200 ms: 105.5 is the value left standing
    #[tokio::test(start_paused = true)]
    async fn test_btc_latest_value_wins() {
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(reference_config(), sink.clone());
        let start = Instant::now();

        engine.submit(MarketUpdate::new("BTC", 100.0, 0)).unwrap();
        sleep_until_ms(start, 200).await;
        engine.submit(MarketUpdate::new("BTC", 105.5, 200)).unwrap();

        sleep_until_ms(start, 1200).await;
        let btc = sink.for_symbol("BTC");
        assert_eq!(btc.first().map(|d| d.update.price), Some(100.0));
        assert_eq!(btc.last().map(|d| d.update.price), Some(105.5));
        assert!(engine.state().store.is_empty());

        scheduler.stop().await;
    }

    /// ETH hammered for a second never goes out twice inside the cooldown
    #[tokio::test(start_paused = true)]
    async fn test_eth_once_per_cooldown() {
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(reference_config(), sink.clone());
        let start = Instant::now();

        for i in 0..99u64 {
            sleep_until_ms(start, i * 10).await;
            engine
                .submit(MarketUpdate::new("ETH", 3000.0 + i as f64, i))
                .unwrap();
        }

        sleep_until_ms(start, 999).await;
        assert!(sink.for_symbol("ETH").len() <= 1);

        sleep_until_ms(start, 1100).await;
        let eth = sink.for_symbol("ETH");
        assert_eq!(eth.len(), 2);
        assert_eq!(eth[1].update.price, 3098.0);

        scheduler.stop().await;
    }

    /// A value arriving mid-cooldown goes out by cooldown + one flush period
    #[tokio::test(start_paused = true)]
    async fn test_eventual_delivery_bound() {
        let config = reference_config();
        let bound = config.symbol_cooldown_ms + config.flush_interval_ms;
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(config, sink.clone());
        let start = Instant::now();

        engine.submit(MarketUpdate::new("X", 1.0, 0)).unwrap();
        sleep_until_ms(start, 500).await;
        engine.submit(MarketUpdate::new("X", 2.0, 500)).unwrap();

        sleep_until_ms(start, bound).await;
        let x = sink.for_symbol("X");
        assert_eq!(x.len(), 2);
        assert!(x[1].at - start <= Duration::from_millis(bound));

        scheduler.stop().await;
    }

    /// Mixed hot and cold symbols over several seconds keep both bounds
    #[tokio::test(start_paused = true)]
    async fn test_bounds_hold_under_sustained_load() {
        let mut config = reference_config();
        config.max_global_rate = 20;
        config.symbol_cooldown_ms = 250;
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(config, sink.clone());
        let start = Instant::now();

        for step in 0..400u64 {
            sleep_until_ms(start, step * 10).await;
            let symbol = format!("S{}", step % 40);
            engine
                .submit(MarketUpdate::new(symbol, step as f64, step))
                .unwrap();
        }
        sleep_until_ms(start, 8000).await;

        let deliveries = sink.deliveries();
        assert!(max_in_window(&deliveries, Duration::from_millis(1000)) <= 20);
        for i in 0..40 {
            let per_symbol = sink.for_symbol(&format!("S{i}"));
            assert!(!per_symbol.is_empty());
            assert!(min_gap(&per_symbol).is_none_or(|gap| gap >= Duration::from_millis(250)));
        }
        // Everything eventually drained
        assert!(engine.state().store.is_empty());

        scheduler.stop().await;
    }

    /// With flushing only, arrivals wait for a tick
    #[tokio::test(start_paused = true)]
    async fn test_flush_only_mode() {
        let mut config = reference_config();
        config.immediate_dispatch = false;
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(config, sink.clone());
        let start = Instant::now();

        sleep_until_ms(start, 3).await;
        assert_eq!(engine.submit(MarketUpdate::new("A", 1.0, 0)).unwrap(), None);
        assert_eq!(sink.count(), 0);

        sleep_until_ms(start, 20).await;
        assert_eq!(sink.count(), 1);

        scheduler.stop().await;
    }

    /// A refused publish is retried after the cooldown when requeue is on
    #[tokio::test(start_paused = true)]
    async fn test_requeue_after_sink_failure() {
        let mut config = reference_config();
        config.sink_failure_policy = SinkFailurePolicy::Requeue;
        let sink = Arc::new(TimedSink::failing_first(1));
        let (engine, scheduler) = start(config, sink.clone());
        let start = Instant::now();

        engine.submit(MarketUpdate::new("SOL", 42.0, 0)).unwrap();
        assert_eq!(sink.count(), 0);
        assert!(engine.state().store.contains("SOL"));

        sleep_until_ms(start, 1100).await;
        let sol = sink.for_symbol("SOL");
        assert_eq!(sol.len(), 1);
        assert_eq!(sol[0].update.price, 42.0);
        assert_eq!(engine.metrics().sink_failures(), 1);

        scheduler.stop().await;
    }
}

#[cfg(test)]
mod pipeline_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use coalescer::{DispatchEngine, FlushScheduler};
    use contracts::{
        ChannelKind, FeedConfig, IngestionConfig, MarketUpdate, OverflowPolicy, SinkConfig,
        SinkType,
    };
    use dispatcher::create_dispatcher;
    use ingestion::{build_channel, IngestionMetrics, IngestionWorker, MockTickFeed, UpdateProducer};
    use tokio_util::sync::CancellationToken;

    use crate::support::*;

    async fn run_through_channel(config: IngestionConfig) {
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(reference_config(), sink.clone());
        let metrics = Arc::new(IngestionMetrics::new());
        let (mut producer, source) = build_channel("ticks", &config, metrics.clone()).unwrap();
        let worker =
            IngestionWorker::spawn(source, engine.clone(), metrics.clone(), CancellationToken::new());

        for i in 0..20 {
            producer
                .offer(MarketUpdate::new(format!("S{}", i % 5), i as f64, 0))
                .await
                .unwrap();
        }
        producer
            .offer(MarketUpdate::new("BAD", f64::NAN, 0))
            .await
            .unwrap();
        drop(producer);

        let stats = worker.join().await;
        assert_eq!(stats.forwarded, 20);
        assert_eq!(stats.rejected, 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        // Each symbol: first value at once, its last value after the cooldown
        for s in 0..5 {
            let prices: Vec<f64> = sink
                .for_symbol(&format!("S{s}"))
                .iter()
                .map(|d| d.update.price)
                .collect();
            assert_eq!(prices.last().copied(), Some((15 + s) as f64));
        }
        assert!(sink.for_symbol("BAD").is_empty());

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_channel_to_engine() {
        run_through_channel(IngestionConfig::default()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ring_buffer_channel_to_engine() {
        run_through_channel(IngestionConfig {
            channel_kind: ChannelKind::RingBuffer,
            overflow_policy: OverflowPolicy::Block,
            ..Default::default()
        })
        .await;
    }

    /// Mock feed -> channel -> worker -> engine -> dispatcher -> file sink
    #[tokio::test(start_paused = true)]
    async fn test_feed_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = HashMap::new();
        params.insert("base_path".to_string(), dir.path().display().to_string());
        let dispatcher = Arc::new(
            create_dispatcher(vec![SinkConfig {
                name: "file".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 256,
                params,
            }])
            .await
            .unwrap(),
        );

        let engine = Arc::new(DispatchEngine::new(reference_config(), dispatcher.clone()));
        let scheduler = FlushScheduler::start(engine.clone());
        let metrics = Arc::new(IngestionMetrics::new());
        let (producer, source) =
            build_channel("ticks", &IngestionConfig::default(), metrics.clone()).unwrap();
        let worker =
            IngestionWorker::spawn(source, engine.clone(), metrics.clone(), CancellationToken::new());

        let feed = MockTickFeed::new(FeedConfig {
            symbols: vec!["AAPL".into(), "MSFT".into()],
            rate_hz: 200.0,
            initial_price: 100.0,
            volatility: 0.001,
        })
        .unwrap()
        .with_seed(11);
        let feed_task = feed.start(producer).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        feed.stop();
        let sent = feed_task.await.unwrap();
        let stats = worker.join().await;
        assert_eq!(stats.forwarded, sent);
        scheduler.stop().await;

        let published = engine.metrics().dispatched();
        drop(engine);
        let dispatcher = Arc::try_unwrap(dispatcher).ok().unwrap();
        let finals = dispatcher.shutdown().await;
        assert_eq!(finals[0].1.write_count, published);

        let path = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let lines: Vec<serde_json::Value> = std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        // Two symbols, 1s cooldown, 1.5s run: two publishes each at most
        assert!(lines.len() as u64 == published && published <= 4);
        assert!(lines
            .iter()
            .all(|l| l["symbol"] == "AAPL" || l["symbol"] == "MSFT"));
    }
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ChannelKind, MarketUpdate, SinkFailurePolicy};
    use tokio::time::Instant;

    use crate::support::*;

    const SERVICE_TOML: &str = r#"
        [throttle]
        max_global_rate = 2
        global_window_ms = 500
        symbol_cooldown_ms = 100
        flush_interval_ms = 5
        sink_failure_policy = "requeue"

        [ingestion]
        channel_kind = "ring_buffer"
        capacity = 64
        overflow_policy = "drop_newest"

        [[sinks]]
        name = "log"
        sink_type = "log"
    "#;

    #[test]
    fn test_service_config_parses() {
        let blueprint = ConfigLoader::load_from_str(SERVICE_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.throttle.max_global_rate, 2);
        assert_eq!(blueprint.throttle.sink_failure_policy, SinkFailurePolicy::Requeue);
        assert_eq!(blueprint.ingestion.channel_kind, ChannelKind::RingBuffer);
        assert!(blueprint.feed.is_none());
    }

    /// Limits loaded from config drive the engine
    #[tokio::test(start_paused = true)]
    async fn test_configured_ceiling_applies() {
        let blueprint = ConfigLoader::load_from_str(SERVICE_TOML, ConfigFormat::Toml).unwrap();
        let sink = Arc::new(TimedSink::default());
        let (engine, scheduler) = start(blueprint.throttle, sink.clone());
        let start_at = Instant::now();

        for symbol in ["A", "B", "C", "D"] {
            engine.submit(MarketUpdate::new(symbol, 1.0, 0)).unwrap();
        }
        assert_eq!(sink.count(), 2);

        sleep_until_ms(start_at, 490).await;
        assert_eq!(sink.count(), 2);

        sleep_until_ms(start_at, 520).await;
        assert_eq!(sink.count(), 4);

        scheduler.stop().await;
    }

    #[test]
    fn test_ring_buffer_drop_oldest_rejected() {
        let toml = SERVICE_TOML.replace("drop_newest", "drop_oldest");
        assert!(ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).is_err());
    }
}
