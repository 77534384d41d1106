//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use contracts::ServiceBlueprint;

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_service(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args).context("Invalid command-line override")?;

    info!(
        max_global_rate = blueprint.throttle.max_global_rate,
        symbol_cooldown_ms = blueprint.throttle.symbol_cooldown_ms,
        flush_interval_ms = blueprint.throttle.flush_interval_ms,
        channel = ?blueprint.ingestion.channel_kind,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting service...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Service execution failed")?;

    stats.print_summary();
    info!("Tick Throttle finished");
    Ok(())
}

/// Apply CLI overrides, then re-run validation on the result
fn apply_overrides(blueprint: &mut ServiceBlueprint, args: &RunArgs) -> Result<()> {
    if let Some(rate) = args.max_global_rate {
        info!(rate, "Overriding max_global_rate from CLI");
        blueprint.throttle.max_global_rate = rate;
    }
    if let Some(cooldown) = args.cooldown_ms {
        info!(cooldown, "Overriding symbol_cooldown_ms from CLI");
        blueprint.throttle.symbol_cooldown_ms = cooldown;
    }
    if let Some(interval) = args.flush_interval_ms {
        info!(interval, "Overriding flush_interval_ms from CLI");
        blueprint.throttle.flush_interval_ms = interval;
    }
    config_loader::ConfigLoader::validate(blueprint)?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed the signal is treated as never arriving.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ServiceBlueprint) {
    let throttle = &blueprint.throttle;
    println!("\n=== Configuration Summary ===\n");
    println!("Throttle:");
    println!(
        "  Global ceiling: {} per {} ms",
        throttle.max_global_rate, throttle.global_window_ms
    );
    println!("  Symbol cooldown: {} ms", throttle.symbol_cooldown_ms);
    println!("  Flush interval: {} ms", throttle.flush_interval_ms);
    println!("  Immediate dispatch: {}", throttle.immediate_dispatch);
    println!("  Sink failure policy: {:?}", throttle.sink_failure_policy);

    println!("\nIngestion:");
    println!(
        "  {:?} channel, capacity {}, overflow {:?}",
        blueprint.ingestion.channel_kind,
        blueprint.ingestion.capacity,
        blueprint.ingestion.overflow_policy
    );

    if let Some(feed) = &blueprint.feed {
        println!("\nFeed:");
        println!("  Symbols ({}): {}", feed.symbols.len(), feed.symbols.join(", "));
        println!("  Rate: {} Hz", feed.rate_hz);
    }

    println!("\nSinks ({}):", blueprint.sinks.len());
    for sink in &blueprint.sinks {
        println!("  - {} ({:?})", sink.name, sink.sink_type);
    }

    println!();
}
