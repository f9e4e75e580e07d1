//! Optional run profiling.
//!
//! The processor calls into a `ProfileHooks` implementation at the start of
//! a run, after every chunk is handed to the workers, and at the end. The
//! default does nothing; `TimingProfiler` collects chunk timings and memory
//! snapshots and writes them out as JSON.

use crate::error::{AggregatorError, Result};
use crate::models::RunStats;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::{debug, info};

/// What a run is about to do
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub input_path: PathBuf,
    pub workers: usize,
    pub chunk_size_bytes: usize,
}

/// Timing for one chunk
#[derive(Debug, Clone, Serialize)]
pub struct ChunkTiming {
    pub index: usize,
    pub lines: usize,
    pub bytes: usize,
    /// Time spent reading the chunk from the source
    pub read: Duration,
    /// Time spent partitioning and queueing, including waiting on full queues
    pub dispatch: Duration,
}

/// Observer hooks injected into the processor
pub trait ProfileHooks: Send {
    fn start(&mut self, context: &RunContext) -> Result<()>;

    fn chunk_dispatched(&mut self, _timing: &ChunkTiming) {}

    fn stop(&mut self, stats: &RunStats) -> Result<()>;
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProfiler;

impl ProfileHooks for NoopProfiler {
    fn start(&mut self, _context: &RunContext) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self, _stats: &RunStats) -> Result<()> {
        Ok(())
    }
}

/// Host memory at a point in time, in bytes
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemorySnapshot {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

impl MemorySnapshot {
    fn capture(system: &mut System) -> Self {
        system.refresh_memory();
        Self {
            total: system.total_memory(),
            used: system.used_memory(),
            available: system.available_memory(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TimingReport<'a> {
    started_at: DateTime<Utc>,
    context: &'a RunContext,
    total_ms: u64,
    memory_at_start: MemorySnapshot,
    memory_at_stop: MemorySnapshot,
    slowest_read_ms: f64,
    slowest_dispatch_ms: f64,
    chunks: &'a [ChunkTiming],
    stats: &'a RunStats,
}

#[derive(Debug)]
struct ActiveRun {
    context: RunContext,
    started_at: DateTime<Utc>,
    started: Instant,
    memory_at_start: MemorySnapshot,
}

/// Records chunk timings and writes
/// `<output_dir>/<unix-seconds>/<input-name>.timings.json` on stop
#[derive(Debug)]
pub struct TimingProfiler {
    output_dir: PathBuf,
    system: System,
    active: Option<ActiveRun>,
    chunks: Vec<ChunkTiming>,
    report_path: Option<PathBuf>,
}

impl TimingProfiler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            system: System::new(),
            active: None,
            chunks: Vec::new(),
            report_path: None,
        }
    }

    /// Path of the last report written, if any
    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }

    fn report_file_name(input_path: &Path) -> String {
        let base = input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        format!("{}.timings.json", base)
    }
}

impl ProfileHooks for TimingProfiler {
    fn start(&mut self, context: &RunContext) -> Result<()> {
        self.chunks.clear();
        self.report_path = None;
        self.active = Some(ActiveRun {
            context: context.clone(),
            started_at: Utc::now(),
            started: Instant::now(),
            memory_at_start: MemorySnapshot::capture(&mut self.system),
        });
        debug!("Profiling started for {}", context.input_path.display());
        Ok(())
    }

    fn chunk_dispatched(&mut self, timing: &ChunkTiming) {
        self.chunks.push(timing.clone());
    }

    fn stop(&mut self, stats: &RunStats) -> Result<()> {
        let run = self
            .active
            .take()
            .ok_or_else(|| AggregatorError::profiling("stop called before start"))?;

        let run_dir = self
            .output_dir
            .join(run.started_at.timestamp().to_string());
        std::fs::create_dir_all(&run_dir).map_err(|e| {
            AggregatorError::profiling(format!("Failed to create {}: {}", run_dir.display(), e))
        })?;

        let slowest = |pick: fn(&ChunkTiming) -> Duration| {
            self.chunks
                .iter()
                .map(pick)
                .max()
                .unwrap_or_default()
                .as_secs_f64()
                * 1000.0
        };

        let report = TimingReport {
            started_at: run.started_at,
            context: &run.context,
            total_ms: run.started.elapsed().as_millis() as u64,
            memory_at_start: run.memory_at_start,
            memory_at_stop: MemorySnapshot::capture(&mut self.system),
            slowest_read_ms: slowest(|timing| timing.read),
            slowest_dispatch_ms: slowest(|timing| timing.dispatch),
            chunks: &self.chunks,
            stats,
        };

        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| AggregatorError::profiling(format!("Failed to encode report: {}", e)))?;

        let path = run_dir.join(Self::report_file_name(&run.context.input_path));
        std::fs::write(&path, json).map_err(|e| {
            AggregatorError::profiling(format!("Failed to write {}: {}", path.display(), e))
        })?;

        info!("Profile written to {}", path.display());
        self.report_path = Some(path);
        Ok(())
    }
}
