//! Error handling for aggregation runs.
//!
//! Only failures that abort a run live here. Malformed input lines are not
//! errors: workers drop them and count them in the run statistics.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Worker {worker} failed: {reason}")]
    WorkerFailed { worker: usize, reason: String },

    #[error("Reducer failed: {reason}")]
    ReducerFailed { reason: String },

    #[error("Profiling error: {message}")]
    Profiling { message: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl AggregatorError {
    /// Wrap an I/O failure with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn worker_failed(worker: usize, reason: impl Into<String>) -> Self {
        Self::WorkerFailed {
            worker,
            reason: reason.into(),
        }
    }

    pub fn reducer_failed(reason: impl Into<String>) -> Self {
        Self::ReducerFailed {
            reason: reason.into(),
        }
    }

    pub fn profiling(message: impl Into<String>) -> Self {
        Self::Profiling {
            message: message.into(),
        }
    }

    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
