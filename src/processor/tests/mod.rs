//! Integration tests for the processor module
//!
//! Runs the complete pipeline against small measurement files on disk.

pub mod error_handling;

#[path = "../../../tests/common/mod.rs"]
mod common;

pub use common::generated_measurements;

use crate::config::{AggregatorConfig, SystemProfile};
use std::path::PathBuf;
use tempfile::TempDir;

/// Write `contents` to a measurements file inside `temp_dir`
pub fn write_measurements(temp_dir: &TempDir, contents: &str) -> PathBuf {
    let path = temp_dir.path().join("measurements.txt");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Deterministic configuration that does not depend on the test machine
pub fn test_config(input_path: PathBuf) -> AggregatorConfig {
    let profile = SystemProfile {
        cpu_cores: 4,
        total_memory_bytes: 0,
    };
    AggregatorConfig::for_system(&profile).with_input(input_path)
}
