//! Configuration management and validation.
//!
//! Defaults are derived from the host (core count and memory), can be
//! overridden by a TOML file, and finally by command-line flags. The
//! pipeline itself only ever sees a validated `AggregatorConfig`.

use crate::constants::{
    CHUNK_MEMORY_FRACTION, CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_INPUT_PATH,
    DEFAULT_PROFILE_DIR, DEFAULT_QUEUE_DEPTH, FALLBACK_CHUNK_SIZE_BYTES,
    MAX_AUTO_CHUNK_SIZE_BYTES, MIN_AUTO_CHUNK_SIZE_BYTES,
};
use crate::error::{AggregatorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// System profiling information used to size the pipeline
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Number of logical CPU cores available
    pub cpu_cores: usize,
    /// Total memory in bytes (0 when it could not be read)
    pub total_memory_bytes: u64,
}

impl SystemProfile {
    /// Auto-detect system capabilities
    pub fn detect() -> Self {
        use sysinfo::System;

        let cpu_cores = num_cpus::get();

        let mut system = System::new();
        system.refresh_memory();

        Self {
            cpu_cores,
            total_memory_bytes: system.total_memory(),
        }
    }

    /// Chunk size that keeps a chunk and its in-flight sub-batches well
    /// inside physical memory
    pub fn recommended_chunk_size(&self) -> usize {
        if self.total_memory_bytes == 0 {
            return FALLBACK_CHUNK_SIZE_BYTES;
        }

        let share = (self.total_memory_bytes / CHUNK_MEMORY_FRACTION) as usize;
        share.clamp(MIN_AUTO_CHUNK_SIZE_BYTES, MAX_AUTO_CHUNK_SIZE_BYTES)
    }

    /// One worker per logical core
    pub fn recommended_workers(&self) -> usize {
        self.cpu_cores.max(1)
    }
}

/// When workers hand their local tables to the reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmissionPolicy {
    /// Once per worker, when the pool shuts down at end of input
    #[default]
    PerRun,
    /// Once per worker per chunk, after the chunk's sub-batches are consumed
    PerChunk,
}

/// Settings for the optional timing profiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    pub enabled: bool,
    /// Reports land in `<output_dir>/<unix-seconds>/`
    pub output_dir: PathBuf,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
        }
    }
}

/// Configuration for one aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// File of `station;value` lines
    pub input_path: PathBuf,

    /// Size of the worker pool
    pub workers: usize,

    /// A chunk is closed once its lines account for at least this many bytes
    pub chunk_size_bytes: usize,

    /// Sub-batches that may wait in each worker's queue
    pub queue_depth: usize,

    pub emission: EmissionPolicy,

    pub profiling: ProfilingConfig,

    /// Draw a progress bar on stderr while reading
    pub show_progress: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::for_system(&SystemProfile::detect())
    }
}

impl AggregatorConfig {
    /// Defaults sized for the given machine
    pub fn for_system(profile: &SystemProfile) -> Self {
        let config = Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            workers: profile.recommended_workers(),
            chunk_size_bytes: profile.recommended_chunk_size(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            emission: EmissionPolicy::default(),
            profiling: ProfilingConfig::default(),
            show_progress: false,
        };

        debug!(
            "Sized for system: {} workers, {} byte chunks ({} cores, {} bytes memory)",
            config.workers, config.chunk_size_bytes, profile.cpu_cores, profile.total_memory_bytes
        );

        config
    }

    /// Create configuration for a given input path
    pub fn with_input(mut self, input_path: impl Into<PathBuf>) -> Self {
        self.input_path = input_path.into();
        self
    }

    /// Create configuration with custom worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the chunk threshold in bytes
    pub fn with_chunk_size(mut self, chunk_size_bytes: usize) -> Self {
        self.chunk_size_bytes = chunk_size_bytes;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_emission(mut self, emission: EmissionPolicy) -> Self {
        self.emission = emission;
        self
    }

    /// Enable the timing profiler, writing reports under `output_dir`
    pub fn with_profiling(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.profiling = ProfilingConfig {
            enabled: true,
            output_dir: output_dir.into(),
        };
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Default config file location, e.g. `~/.config/station-aggregator/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            AggregatorError::configuration("Could not determine user config directory")
        })?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse a TOML config file; fields it leaves out keep their system defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AggregatorError::configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&contents).map_err(|e| {
            AggregatorError::configuration(format!("{} ({})", e, path.display()))
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AggregatorError::configuration(format!("Invalid config file: {}", e)))
    }

    /// Load defaults, then the config file if one is given
    pub fn load_layered(config_file: Option<&Path>) -> Result<Self> {
        match config_file {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AggregatorError::configuration(
                "workers must be at least 1",
            ));
        }
        if self.chunk_size_bytes == 0 {
            return Err(AggregatorError::configuration(
                "chunk_size_bytes must be greater than 0",
            ));
        }
        if self.queue_depth == 0 {
            return Err(AggregatorError::configuration(
                "queue_depth must be at least 1",
            ));
        }
        if self.input_path.as_os_str().is_empty() {
            return Err(AggregatorError::configuration("input_path is empty"));
        }
        Ok(())
    }
}
