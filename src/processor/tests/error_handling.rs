//! Error handling integration tests

use super::{test_config, write_measurements};
use crate::error::AggregatorError;
use crate::models::RunStats;
use crate::processor::MeasurementProcessor;
use crate::profiling::{ProfileHooks, RunContext};
use tempfile::TempDir;

#[tokio::test]
async fn test_nonexistent_input_path() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nonexistent.txt");

    let mut processor = MeasurementProcessor::new(test_config(missing.clone())).unwrap();
    let result = processor.process().await;

    match result {
        Err(AggregatorError::InputNotFound { path }) => assert_eq!(path, missing),
        other => panic!("Expected InputNotFound error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_directory_as_input_is_io_error() {
    let temp_dir = TempDir::new().unwrap();

    let mut processor =
        MeasurementProcessor::new(test_config(temp_dir.path().to_path_buf())).unwrap();
    let result = processor.process().await;

    assert!(matches!(result, Err(AggregatorError::Io { .. })));
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path().join("measurements.txt")).with_workers(0);

    let result = MeasurementProcessor::new(config);
    assert!(matches!(result, Err(AggregatorError::Configuration { .. })));
}

/// Hooks that refuse to start
struct FailingProfiler;

impl ProfileHooks for FailingProfiler {
    fn start(&mut self, _context: &RunContext) -> crate::error::Result<()> {
        Err(AggregatorError::profiling("no space left"))
    }

    fn stop(&mut self, _stats: &RunStats) -> crate::error::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_profiler_failure_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_measurements(&temp_dir, "Hamburg;12.0\n");

    let mut processor = MeasurementProcessor::new(test_config(path))
        .unwrap()
        .with_profiler(Box::new(FailingProfiler));
    let result = processor.process().await;

    assert!(matches!(result, Err(AggregatorError::Profiling { .. })));
}

#[tokio::test]
async fn test_timing_profiler_writes_report_for_run() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_measurements(&temp_dir, "Hamburg;12.0\nOslo;3.0\n");
    let profile_dir = temp_dir.path().join("profiles");

    let config = test_config(path).with_profiling(&profile_dir);
    let mut processor = MeasurementProcessor::new(config).unwrap();
    let report = processor.process().await.unwrap();
    assert_eq!(report.stats.stations, 2);

    let run_dirs: Vec<_> = std::fs::read_dir(&profile_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(run_dirs.len(), 1);
    assert!(run_dirs[0].join("measurements.txt.timings.json").exists());
}
