//! Main processing engine.
//!
//! Orchestrates one aggregation run: the chunk reader feeds a long-lived
//! worker pool through the distributor, workers emit local tables to the
//! reducer, and the reducer's global table becomes the report.

pub mod distributor;
pub mod reader;
pub mod reducer;
pub mod worker;

#[cfg(test)]
pub mod tests;

use self::{distributor::WorkerPool, reader::ChunkReader, reducer::Reducer};

use crate::config::AggregatorConfig;
use crate::error::{AggregatorError, Result};
use crate::models::{RunStats, SummaryTable};
use crate::output::Report;
use crate::profiling::{ChunkTiming, NoopProfiler, ProfileHooks, RunContext, TimingProfiler};

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub stations: SummaryTable,
    pub stats: RunStats,
}

impl AggregationReport {
    /// The `{name=min/mean/max, ...}` line
    pub fn render(&self) -> String {
        Report::new(&self.stations).to_string()
    }
}

/// Runs the aggregation pipeline for one input
pub struct MeasurementProcessor {
    config: AggregatorConfig,
    profiler: Box<dyn ProfileHooks>,
}

impl std::fmt::Debug for MeasurementProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MeasurementProcessor {
    /// Create a processor for a validated configuration
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        config.validate()?;

        let profiler: Box<dyn ProfileHooks> = if config.profiling.enabled {
            Box::new(TimingProfiler::new(config.profiling.output_dir.clone()))
        } else {
            Box::new(NoopProfiler)
        };

        Ok(Self { config, profiler })
    }

    /// Replace the profiling hooks
    pub fn with_profiler(mut self, profiler: Box<dyn ProfileHooks>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregate the configured input file
    pub async fn process(&mut self) -> Result<AggregationReport> {
        let path = self.config.input_path.clone();
        if !path.exists() {
            return Err(AggregatorError::InputNotFound { path });
        }

        let total_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|e| AggregatorError::io(&path, e))?
            .len();

        let reader = ChunkReader::open(&path, self.config.chunk_size_bytes).await?;
        self.process_chunks(reader, Some(total_bytes)).await
    }

    /// Aggregate an arbitrary buffered source, labelled with the configured path
    pub async fn process_source<R>(&mut self, source: R) -> Result<AggregationReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let reader = ChunkReader::new(
            source,
            self.config.input_path.clone(),
            self.config.chunk_size_bytes,
        );
        self.process_chunks(reader, None).await
    }

    async fn process_chunks<R>(
        &mut self,
        mut reader: ChunkReader<R>,
        total_bytes: Option<u64>,
    ) -> Result<AggregationReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let start_time = Instant::now();
        let workers = self.config.workers;

        self.profiler.start(&RunContext {
            input_path: self.config.input_path.clone(),
            workers,
            chunk_size_bytes: self.config.chunk_size_bytes,
        })?;

        info!(
            "Aggregating {} with {} workers ({} byte chunks)",
            self.config.input_path.display(),
            workers,
            self.config.chunk_size_bytes
        );

        let (emission_tx, emission_rx) = mpsc::channel(workers);
        let reducer = Reducer::spawn(emission_rx, workers);
        let pool = WorkerPool::spawn(
            workers,
            self.config.queue_depth,
            self.config.emission,
            emission_tx,
        )?;

        let progress = self.create_progress_bar(total_bytes);

        loop {
            let read_started = Instant::now();
            let chunk = reader.next_chunk().await?;
            if chunk.is_empty() {
                break;
            }
            let read = read_started.elapsed();

            let (index, lines, bytes) = (chunk.index, chunk.len(), chunk.bytes);
            let dispatch_started = Instant::now();
            pool.dispatch(chunk).await?;

            self.profiler.chunk_dispatched(&ChunkTiming {
                index,
                lines,
                bytes,
                read,
                dispatch: dispatch_started.elapsed(),
            });
            progress.set_position(reader.bytes_read());
            debug!("Chunk {} dispatched: {} lines, {} bytes", index, lines, bytes);
        }

        // Every worker must have emitted before the global table is read
        pool.shutdown().await?;
        let reduction = reducer.finish().await?;
        progress.finish_and_clear();

        let stats = RunStats {
            input_path: self.config.input_path.clone(),
            lines_read: reader.lines_read(),
            records_aggregated: reduction.records,
            lines_rejected: reduction.rejected,
            chunks_read: reader.chunks_read(),
            bytes_read: reader.bytes_read(),
            emissions: reduction.emissions,
            stations: reduction.table.len(),
            workers,
            processing_time_ms: start_time.elapsed().as_millis() as u64,
        };

        self.profiler.stop(&stats)?;
        info!("{}", stats.summary());

        Ok(AggregationReport {
            stations: reduction.table,
            stats,
        })
    }

    fn create_progress_bar(&self, total_bytes: Option<u64>) -> ProgressBar {
        let total = match total_bytes {
            Some(total) if self.config.show_progress => total,
            _ => return ProgressBar::hidden(),
        };

        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) [{bytes_per_sec}] ETA: {eta}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("Aggregating");
        pb
    }
}
