//! Command-line argument definitions for the station aggregator
//!
//! Every flag is optional: anything left out falls back to the config file
//! and then to the defaults sized for the current machine.

use crate::config::{AggregatorConfig, EmissionPolicy};
use crate::constants::{
    DEFAULT_PROFILE_DIR, LOG_LEVEL_DEBUG, LOG_LEVEL_ERROR, LOG_LEVEL_INFO,
    LOG_LEVEL_TRACE, LOG_LEVEL_WARN,
};
use crate::error::{AggregatorError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments for the station aggregator
///
/// Reads `station;value` lines and prints the min/mean/max of every station.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "station-aggregator",
    version,
    about = "Compute per-station min/mean/max from a file of station;value lines",
    long_about = "Streams a measurements file in line-aligned chunks, aggregates each chunk \
                  across a pool of workers and prints one sorted line of the form \
                  {station=min/mean/max, ...} to stdout."
)]
pub struct Args {
    /// Measurements file, one `station;value` per line
    ///
    /// Falls back to the config file, then to `measurements.txt`.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Number of aggregation workers
    #[arg(
        short = 'j',
        long = "workers",
        value_name = "N",
        help = "Number of aggregation workers (default: logical CPU count)"
    )]
    pub workers: Option<usize>,

    /// Chunk threshold
    ///
    /// Accepts plain bytes or a unit suffix: 4096, 64KiB, 32MiB, 3GiB, 1GB.
    #[arg(
        long = "chunk-size",
        value_name = "SIZE",
        help = "Chunk size threshold, e.g. 64MiB (default: derived from memory)"
    )]
    pub chunk_size: Option<ByteSize>,

    /// Sub-batches that may wait in each worker's queue
    #[arg(long = "queue-depth", value_name = "N")]
    pub queue_depth: Option<usize>,

    /// Emit worker tables after every chunk instead of once per run
    #[arg(long = "emit-per-chunk")]
    pub emit_per_chunk: bool,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write per-chunk timings and memory snapshots after the run
    #[arg(long = "profile")]
    pub profile: bool,

    /// Directory for profile reports
    #[arg(long = "profile-dir", value_name = "DIR", default_value = DEFAULT_PROFILE_DIR)]
    pub profile_dir: PathBuf,

    /// Show a progress bar on stderr
    #[arg(long = "progress")]
    pub progress: bool,

    /// Print a run summary to stderr
    #[arg(long = "stats")]
    pub stats: bool,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress logging except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Args {
    /// Get the logging level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            LOG_LEVEL_ERROR
        } else {
            match self.verbose {
                0 => LOG_LEVEL_WARN,
                1 => LOG_LEVEL_INFO,
                2 => LOG_LEVEL_DEBUG,
                _ => LOG_LEVEL_TRACE,
            }
        }
    }

    /// Layer the command-line flags over an already loaded configuration
    pub fn apply_to(&self, mut config: AggregatorConfig) -> AggregatorConfig {
        if let Some(input) = &self.input {
            config.input_path = input.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size_bytes = chunk_size.bytes();
        }
        if let Some(queue_depth) = self.queue_depth {
            config.queue_depth = queue_depth;
        }
        if self.emit_per_chunk {
            config.emission = EmissionPolicy::PerChunk;
        }
        if self.profile {
            config = config.with_profiling(self.profile_dir.clone());
        }
        if self.progress && !self.quiet {
            config.show_progress = true;
        }

        config
    }
}

/// A byte count parsed from `4096`, `64KiB`, `32MiB`, `1GB` and the like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(usize);

impl ByteSize {
    pub fn bytes(self) -> usize {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);

        if digits.is_empty() {
            return Err(AggregatorError::configuration(format!(
                "Invalid size '{}': expected a number such as 64MiB",
                s
            )));
        }

        let value: u64 = digits.parse().map_err(|_| {
            AggregatorError::configuration(format!("Invalid size '{}': number too large", s))
        })?;

        let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" => 1_000,
            "kib" => 1 << 10,
            "m" | "mb" => 1_000_000,
            "mib" => 1 << 20,
            "g" | "gb" => 1_000_000_000,
            "gib" => 1 << 30,
            other => {
                return Err(AggregatorError::configuration(format!(
                    "Unknown size unit '{}'. Use B, KB, KiB, MB, MiB, GB or GiB",
                    other
                )));
            }
        };

        value
            .checked_mul(multiplier)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .map(ByteSize)
            .ok_or_else(|| {
                AggregatorError::configuration(format!("Invalid size '{}': too large", s))
            })
    }
}
