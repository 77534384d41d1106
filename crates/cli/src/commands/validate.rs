//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    max_global_rate: u32,
    global_window_ms: u64,
    symbol_cooldown_ms: u64,
    channel: String,
    feed_symbols: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    max_global_rate: blueprint.throttle.max_global_rate,
                    global_window_ms: blueprint.throttle.global_window_ms,
                    symbol_cooldown_ms: blueprint.throttle.symbol_cooldown_ms,
                    channel: format!("{:?}", blueprint.ingestion.channel_kind),
                    feed_symbols: blueprint.feed.as_ref().map_or(0, |f| f.symbols.len()),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::ServiceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let throttle = &blueprint.throttle;

    if blueprint.feed.is_none() {
        warnings.push("No feed configured - the service will only idle".to_string());
    }

    if !throttle.immediate_dispatch {
        warnings.push(format!(
            "immediate_dispatch is off - every publish waits for a flush tick ({} ms)",
            throttle.flush_interval_ms
        ));
    }

    // A cooldown shorter than the window lets a few symbols take the whole ceiling
    if let Some(feed) = &blueprint.feed {
        let per_symbol_max = throttle.global_window_ms / throttle.symbol_cooldown_ms.max(1);
        let demand = per_symbol_max.saturating_mul(feed.symbols.len() as u64);
        if demand > u64::from(throttle.max_global_rate) {
            warnings.push(format!(
                "{} symbols can demand up to {} publishes per window, ceiling is {} - expect deferrals",
                feed.symbols.len(),
                demand,
                throttle.max_global_rate
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Ceiling: {} per {} ms",
                summary.max_global_rate, summary.global_window_ms
            );
            println!("  Cooldown: {} ms", summary.symbol_cooldown_ms);
            println!("  Channel: {}", summary.channel);
            println!("  Feed symbols: {}", summary.feed_symbols);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = config_file(
            r#"
            [throttle]
            max_global_rate = 10

            [feed]
            symbols = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K"]
            rate_hz = 100.0

            [[sinks]]
            name = "log"
            sink_type = "log"
            "#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };

        let result = validate_config(&args);
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.feed_symbols, 11);
        assert_eq!(result.warnings.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_config_reported() {
        let file = config_file("[[sinks]]\nname = \"\"\nsink_type = \"log\"\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/tick-throttle.toml".into(),
            json: false,
        };
        assert!(!validate_config(&args).valid);
    }
}
