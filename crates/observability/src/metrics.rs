//! 分发引擎指标收集模块
//!
//! Prometheus 指标记录函数 + 进程内聚合统计（CLI 摘要使用）。

use std::collections::HashMap;

use contracts::DispatchOutcome;
use metrics::{counter, gauge, histogram};

/// 记录一次分发决策结果
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_dispatch_outcome;
///
/// let outcome = engine.try_dispatch(&symbol);
/// record_dispatch_outcome(outcome);
/// ```
pub fn record_dispatch_outcome(outcome: DispatchOutcome) {
    counter!(
        "tick_throttle_dispatch_outcomes_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// 记录更新进入摄取通道
pub fn record_update_received(channel: &str) {
    counter!(
        "tick_throttle_updates_received_total",
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// 记录被拒绝的更新（格式错误）
pub fn record_update_rejected(reason: &'static str) {
    counter!("tick_throttle_updates_rejected_total", "reason" => reason).increment(1);
}

/// 记录被覆盖的待发布值（合并）
pub fn record_update_coalesced() {
    counter!("tick_throttle_updates_coalesced_total").increment(1);
}

/// 记录通道满时丢弃的更新
pub fn record_update_dropped(channel: &str, policy: &'static str) {
    counter!(
        "tick_throttle_updates_dropped_total",
        "channel" => channel.to_string(),
        "policy" => policy
    )
    .increment(1);
}

/// 记录 Sink 投递
pub fn record_sink_delivery(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "tick_throttle_sink_deliveries_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录 Sink 调用失败
pub fn record_sink_failure(sink_name: &str) {
    counter!(
        "tick_throttle_sink_failures_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录 flush tick 中捕获的 panic
pub fn record_tick_panic() {
    counter!("tick_throttle_flush_tick_panics_total").increment(1);
}

/// 记录发布延迟（行情产生 -> 交给 Sink）
pub fn record_publish_latency_ms(latency_ms: f64) {
    histogram!("tick_throttle_publish_latency_ms").record(latency_ms);
}

/// 记录待发布 symbol 数
pub fn record_pending_keys(count: usize) {
    gauge!("tick_throttle_pending_keys").set(count as f64);
}

/// 记录重试集合大小
pub fn record_retry_keys(count: usize) {
    gauge!("tick_throttle_retry_keys").set(count as f64);
}

/// 记录全局窗口占用
pub fn record_window_occupancy(count: usize) {
    gauge!("tick_throttle_window_occupancy").set(count as f64);
}

/// 分发指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchMetricsAggregator {
    /// 已发布总数
    pub total_delivered: u64,

    /// Sink 失败次数
    pub total_failed: u64,

    /// 发布延迟统计 (ms)
    pub latency_stats: RunningStats,

    /// 各 symbol 发布次数
    pub delivered_per_symbol: HashMap<String, u64>,
}

impl DispatchMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次发布
    pub fn record_delivery(&mut self, symbol: &str, latency_ms: f64, success: bool) {
        if !success {
            self.total_failed += 1;
            return;
        }
        self.total_delivered += 1;
        self.latency_stats.push(latency_ms);
        *self
            .delivered_per_symbol
            .entry(symbol.to_string())
            .or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let attempts = self.total_delivered + self.total_failed;
        MetricsSummary {
            total_delivered: self.total_delivered,
            total_failed: self.total_failed,
            failure_rate: if attempts > 0 {
                self.total_failed as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            distinct_symbols: self.delivered_per_symbol.len(),
            latency_ms: StatsSummary::from(&self.latency_stats),
            busiest_symbol: self
                .delivered_per_symbol
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(symbol, count)| (symbol.clone(), *count)),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_delivered: u64,
    pub total_failed: u64,
    pub failure_rate: f64,
    pub distinct_symbols: usize,
    pub latency_ms: StatsSummary,
    pub busiest_symbol: Option<(String, u64)>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Metrics Summary ===")?;
        writeln!(f, "Delivered: {}", self.total_delivered)?;
        writeln!(
            f,
            "Sink failures: {} ({:.2}%)",
            self.total_failed, self.failure_rate
        )?;
        writeln!(f, "Distinct symbols: {}", self.distinct_symbols)?;
        writeln!(f, "Publish latency (ms): {}", self.latency_ms)?;
        if let Some((symbol, count)) = &self.busiest_symbol {
            writeln!(f, "Busiest symbol: {} ({})", symbol, count)?;
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_record_delivery() {
        let mut aggregator = DispatchMetricsAggregator::new();

        aggregator.record_delivery("AAPL", 2.0, true);
        aggregator.record_delivery("AAPL", 4.0, true);
        aggregator.record_delivery("BTC", 1.0, true);
        aggregator.record_delivery("BTC", 9.0, false);

        assert_eq!(aggregator.total_delivered, 3);
        assert_eq!(aggregator.total_failed, 1);
        assert_eq!(aggregator.delivered_per_symbol.get("AAPL"), Some(&2));

        let summary = aggregator.summary();
        assert_eq!(summary.distinct_symbols, 2);
        assert_eq!(summary.busiest_symbol, Some(("AAPL".to_string(), 2)));
        assert!((summary.failure_rate - 25.0).abs() < 1e-10);
        assert_eq!(summary.latency_ms.count, 3);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_delivered: 100,
            total_failed: 5,
            failure_rate: 4.76,
            distinct_symbols: 10,
            latency_ms: StatsSummary {
                count: 100,
                min: 0.5,
                max: 12.0,
                mean: 3.0,
                std_dev: 1.5,
            },
            busiest_symbol: Some(("AAPL".to_string(), 12)),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Delivered: 100"));
        assert!(output.contains("4.76%"));
        assert!(output.contains("Busiest symbol: AAPL (12)"));
    }

    #[test]
    fn test_empty_stats_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");
    }

    #[test]
    fn test_helpers_without_recorder() {
        // 未安装 recorder 时记录为 no-op
        record_dispatch_outcome(DispatchOutcome::Dispatched);
        record_update_received("bounded");
        record_window_occupancy(3);
    }
}
