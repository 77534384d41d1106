//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tick Throttle - per-symbol coalescing and rate limiting for market data
#[derive(Parser, Debug)]
#[command(
    name = "tick-throttle",
    author,
    version,
    about = "Per-symbol market data throttle",
    long_about = "Coalesces a high-rate stream of market updates to the latest value per symbol\n\
                  and publishes it under a global rate ceiling and a per-symbol cooldown.\n\n\
                  Reads ticks from the configured feed, throttles them, and dispatches the\n\
                  admitted updates to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TICK_THROTTLE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TICK_THROTTLE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the throttle service
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "TICK_THROTTLE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override throttle.max_global_rate
    #[arg(long, env = "TICK_THROTTLE_MAX_GLOBAL_RATE")]
    pub max_global_rate: Option<u32>,

    /// Override throttle.symbol_cooldown_ms
    #[arg(long, env = "TICK_THROTTLE_COOLDOWN_MS")]
    pub cooldown_ms: Option<u64>,

    /// Override throttle.flush_interval_ms
    #[arg(long, env = "TICK_THROTTLE_FLUSH_INTERVAL_MS")]
    pub flush_interval_ms: Option<u64>,

    /// Run time in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "TICK_THROTTLE_DURATION")]
    pub duration: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TICK_THROTTLE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "tick-throttle",
            "-v",
            "run",
            "--config",
            "svc.toml",
            "--max-global-rate",
            "50",
            "--duration",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("svc.toml"));
        assert_eq!(args.max_global_rate, Some(50));
        assert_eq!(args.cooldown_ms, None);
        assert_eq!(args.duration, 3);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["tick-throttle", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
