//! Station Aggregator Library
//!
//! Computes the minimum, mean and maximum value of every station in a file
//! of `station;value` lines and renders them as one sorted line:
//! `{Abha=-23.0/18.0/59.2, Abidjan=-16.2/26.0/67.3, ...}`.
//!
//! This library provides tools for:
//! - Reading the input in line-aligned chunks of a configurable size
//! - Spreading each chunk over a long-lived pool of aggregation workers
//! - Reducing worker tables into one global table in a deterministic order
//! - Formatting the result with the one-decimal rounding policy
//! - Optional timing profiles written as JSON

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod output;
pub mod processor;
pub mod profiling;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{AggregatorConfig, EmissionPolicy, SystemProfile};
pub use error::{AggregatorError, Result};
pub use models::{RunStats, StationSummary, SummaryTable};
pub use output::format_report;
pub use processor::{AggregationReport, MeasurementProcessor};
pub use profiling::{NoopProfiler, ProfileHooks, TimingProfiler};
