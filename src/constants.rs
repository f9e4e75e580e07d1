//! Application constants for the station aggregator
//!
//! Default values and fixed format characters used throughout the pipeline.

// =============================================================================
// Input Format
// =============================================================================

/// Separator between station name and measurement on each input line
pub const FIELD_DELIMITER: char = ';';

/// Input path used when none is given on the command line
pub const DEFAULT_INPUT_PATH: &str = "measurements.txt";

// =============================================================================
// Processing Configuration Defaults
// =============================================================================

/// Fraction of total system memory a single chunk may occupy (1/N)
pub const CHUNK_MEMORY_FRACTION: u64 = 32;

/// Smallest chunk size picked by auto-detection
pub const MIN_AUTO_CHUNK_SIZE_BYTES: usize = 8 * 1024 * 1024;

/// Largest chunk size picked by auto-detection
pub const MAX_AUTO_CHUNK_SIZE_BYTES: usize = 1024 * 1024 * 1024;

/// Chunk size used when the system memory cannot be detected
pub const FALLBACK_CHUNK_SIZE_BYTES: usize = 64 * 1024 * 1024;

/// Capacity of the buffered reader wrapped around the input file
pub const READ_BUFFER_BYTES: usize = 1024 * 1024;

/// Sub-batches each worker may have queued ahead of it
pub const DEFAULT_QUEUE_DEPTH: usize = 2;

/// Initial capacity reserved for a worker's local table
pub const EXPECTED_STATIONS: usize = 512;

// =============================================================================
// Output Format
// =============================================================================

/// Bias added before flooring to one decimal place
pub const ROUNDING_BIAS: f64 = 0.06;

// =============================================================================
// Profiling and Configuration Files
// =============================================================================

/// Directory that timing reports are written under
pub const DEFAULT_PROFILE_DIR: &str = "profiles";

/// Application directory name under the user config directory
pub const CONFIG_DIR_NAME: &str = "station-aggregator";

/// Configuration file name inside the application config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Log level names accepted by the subscriber filter
pub const LOG_LEVEL_ERROR: &str = "error";
pub const LOG_LEVEL_WARN: &str = "warn";
pub const LOG_LEVEL_INFO: &str = "info";
pub const LOG_LEVEL_DEBUG: &str = "debug";
pub const LOG_LEVEL_TRACE: &str = "trace";
