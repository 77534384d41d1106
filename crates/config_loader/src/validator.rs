//! Configuration validation
//!
//! Rules:
//! - numeric limits > 0 (declarative, `validator` derive on the contracts)
//! - flush_interval_ms <= symbol_cooldown_ms
//! - ring buffer channel cannot drop the oldest update
//! - at least one sink; sink names non-empty and unique; queue_capacity > 0
//! - feed symbols non-empty, unique, rate_hz > 0

use std::collections::HashSet;

use contracts::{ChannelKind, ContractError, OverflowPolicy, ServiceBlueprint};
use validator::Validate;

/// Validate a ServiceBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    validate_declared_ranges(blueprint)?;
    validate_throttle(blueprint)?;
    validate_ingestion(blueprint)?;
    validate_feed(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_declared_ranges(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

fn validate_throttle(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let throttle = &blueprint.throttle;
    if throttle.flush_interval_ms > throttle.symbol_cooldown_ms {
        return Err(ContractError::config_validation(
            "throttle.flush_interval_ms / throttle.symbol_cooldown_ms",
            format!(
                "flush_interval_ms ({}) must be <= symbol_cooldown_ms ({})",
                throttle.flush_interval_ms, throttle.symbol_cooldown_ms
            ),
        ));
    }
    Ok(())
}

fn validate_ingestion(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let ingestion = &blueprint.ingestion;
    if ingestion.channel_kind == ChannelKind::RingBuffer
        && ingestion.overflow_policy == OverflowPolicy::DropOldest
    {
        return Err(ContractError::config_validation(
            "ingestion.overflow_policy",
            "ring_buffer channel supports drop_newest or block only",
        ));
    }
    Ok(())
}

fn validate_feed(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let Some(feed) = &blueprint.feed else {
        return Ok(());
    };

    if feed.symbols.is_empty() {
        return Err(ContractError::config_validation(
            "feed.symbols",
            "feed needs at least one symbol",
        ));
    }

    let mut seen = HashSet::new();
    for symbol in &feed.symbols {
        if symbol.trim().is_empty() {
            return Err(ContractError::config_validation(
                "feed.symbols",
                "symbol cannot be empty",
            ));
        }
        if !seen.insert(symbol) {
            return Err(ContractError::config_validation(
                format!("feed.symbols[{symbol}]"),
                "duplicate symbol",
            ));
        }
    }

    if feed.rate_hz.is_nan() || feed.rate_hz <= 0.0 {
        return Err(ContractError::config_validation(
            "feed.rate_hz",
            format!("rate_hz must be > 0, got {}", feed.rate_hz),
        ));
    }
    if feed.initial_price.is_nan() || feed.initial_price <= 0.0 {
        return Err(ContractError::config_validation(
            "feed.initial_price",
            format!("initial_price must be > 0, got {}", feed.initial_price),
        ));
    }
    Ok(())
}

fn validate_sinks(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    if blueprint.sinks.is_empty() {
        return Err(ContractError::config_validation(
            "sinks",
            "at least one sink is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, FeedConfig, IngestionConfig, SinkConfig, SinkType, ThrottleConfig,
    };

    fn minimal_blueprint() -> ServiceBlueprint {
        ServiceBlueprint {
            version: ConfigVersion::V1,
            throttle: ThrottleConfig::default(),
            ingestion: IngestionConfig::default(),
            feed: Some(FeedConfig {
                symbols: vec!["AAPL".into(), "BTC".into()],
                rate_hz: 100.0,
                initial_price: 100.0,
                volatility: 0.001,
            }),
            sinks: vec![SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: 100,
                params: Default::default(),
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_global_rate() {
        let mut bp = minimal_blueprint();
        bp.throttle.max_global_rate = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("throttle"), "got: {err}");
    }

    #[test]
    fn test_flush_longer_than_cooldown() {
        let mut bp = minimal_blueprint();
        bp.throttle.flush_interval_ms = 2000;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("flush_interval_ms"), "got: {err}");
    }

    #[test]
    fn test_ring_buffer_drop_oldest_rejected() {
        let mut bp = minimal_blueprint();
        bp.ingestion.channel_kind = contracts::ChannelKind::RingBuffer;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("ring_buffer"), "got: {err}");

        bp.ingestion.overflow_policy = contracts::OverflowPolicy::DropNewest;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_feed_symbol() {
        let mut bp = minimal_blueprint();
        if let Some(feed) = bp.feed.as_mut() {
            feed.symbols.push("AAPL".into());
        }
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate symbol"), "got: {err}");
    }

    #[test]
    fn test_invalid_feed_rate() {
        let mut bp = minimal_blueprint();
        if let Some(feed) = bp.feed.as_mut() {
            feed.rate_hz = 0.0;
        }
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("rate_hz must be > 0"), "got: {err}");
    }

    #[test]
    fn test_no_sinks() {
        let mut bp = minimal_blueprint();
        bp.sinks.clear();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("at least one sink"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }
}
