//! Command implementation for the station aggregator
//!
//! Wires logging, configuration layering and the processor together for the
//! binary. Everything here reports through `anyhow` so `main` can print the
//! whole context chain.

use crate::cli::args::Args;
use crate::config::AggregatorConfig;
use crate::models::RunStats;
use crate::processor::{AggregationReport, MeasurementProcessor};

use anyhow::{Context, Result};
use colored::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Run one aggregation as described by the command line
pub async fn run(args: Args) -> Result<AggregationReport> {
    setup_logging(&args)?;

    let config = load_configuration(&args).context("Failed to load configuration")?;
    info!(
        "Configuration: {} workers, {} byte chunks, queue depth {}, {:?} emission",
        config.workers, config.chunk_size_bytes, config.queue_depth, config.emission
    );

    let mut processor = MeasurementProcessor::new(config)?;
    let report = processor
        .process()
        .await
        .context("Aggregation failed")?;

    if args.stats {
        print_run_summary(&report.stats);
    }

    Ok(report)
}

/// Set up structured logging on stderr so stdout only carries the result
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("station_aggregator={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialise logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Defaults, then the config file, then command-line flags
pub fn load_configuration(args: &Args) -> crate::Result<AggregatorConfig> {
    let config_file = match &args.config {
        Some(path) => Some(path.clone()),
        None => default_config_file(),
    };

    let config = AggregatorConfig::load_layered(config_file.as_deref())?;
    let config = args.apply_to(config);
    config.validate()?;
    Ok(config)
}

/// The per-user config file, when one has been created
fn default_config_file() -> Option<PathBuf> {
    let path = AggregatorConfig::default_config_path().ok()?;
    if path.is_file() {
        debug!("Using config file {}", path.display());
        Some(path)
    } else {
        None
    }
}

/// Human readable summary, written to stderr
pub fn print_run_summary(stats: &RunStats) {
    eprintln!();
    eprintln!("{}", "Aggregation summary".bright_green().bold());
    eprintln!("  Input:       {}", stats.input_path.display());
    eprintln!(
        "  Lines:       {} read, {} aggregated, {} rejected ({:.2}% accepted)",
        stats.lines_read,
        stats.records_aggregated,
        stats.lines_rejected,
        stats.acceptance_rate()
    );
    eprintln!(
        "  Chunks:      {} ({} bytes)",
        stats.chunks_read, stats.bytes_read
    );
    eprintln!(
        "  Workers:     {} ({} emissions)",
        stats.workers, stats.emissions
    );
    eprintln!("  Stations:    {}", stats.stations.to_string().bright_yellow());
    eprintln!(
        "  Time:        {} ms ({:.1} MiB/s)",
        stats.processing_time_ms,
        stats.throughput_mib_per_sec()
    );

    if stats.lines_rejected > 0 {
        eprintln!(
            "  {}",
            format!("{} malformed lines were skipped", stats.lines_rejected).yellow()
        );
    }
}
