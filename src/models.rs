//! Core data structures for station aggregation.
//!
//! Defines the parsed record, the per-station running summary, the
//! summary tables that workers and the reducer own, and run statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One parsed input line, borrowed from the line it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    pub station: &'a str,
    pub value: f64,
}

/// Running min/max/sum/count for one station
///
/// A summary only exists once a station has been seen, so `count` is
/// always at least 1 and `min <= max` holds for every stored value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl StationSummary {
    /// Start a summary from the first value seen for a station
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    /// Fold one more measurement in. Ties keep the value already stored.
    #[inline]
    pub fn fold(&mut self, value: f64) {
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.sum += value;
        self.count += 1;
    }

    /// Combine another partial summary for the same station into this one
    #[inline]
    pub fn merge(&mut self, other: &StationSummary) {
        if other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Station name to summary. Used both for a worker's local table and for
/// the reducer's global table; ownership decides which one it is.
pub type SummaryTable = HashMap<String, StationSummary>;

/// Fold a record into a table, creating the summary on first sight
#[inline]
pub fn fold_record(table: &mut SummaryTable, record: Record<'_>) {
    match table.get_mut(record.station) {
        Some(summary) => summary.fold(record.value),
        None => {
            table.insert(record.station.to_owned(), StationSummary::new(record.value));
        }
    }
}

/// Merge every entry of `source` into `target`
pub fn merge_tables(target: &mut SummaryTable, source: SummaryTable) {
    for (station, summary) in source {
        match target.get_mut(&station) {
            Some(existing) => existing.merge(&summary),
            None => {
                target.insert(station, summary);
            }
        }
    }
}

/// A line-aligned slice of the input handed to the distributor
#[derive(Debug, Default, Clone)]
pub struct Chunk {
    /// Position of this chunk in the input, starting at 0
    pub index: usize,
    pub lines: Vec<String>,
    /// Bytes accounted for by these lines, one terminator per line included
    pub bytes: usize,
}

impl Chunk {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Counters collected over one aggregation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub input_path: PathBuf,
    pub lines_read: u64,
    pub records_aggregated: u64,
    pub lines_rejected: u64,
    pub chunks_read: usize,
    pub bytes_read: u64,
    pub emissions: usize,
    pub stations: usize,
    pub workers: usize,
    pub processing_time_ms: u64,
}

impl RunStats {
    /// Share of lines that produced a record, as a percentage
    pub fn acceptance_rate(&self) -> f64 {
        if self.lines_read == 0 {
            100.0
        } else {
            (self.records_aggregated as f64 / self.lines_read as f64) * 100.0
        }
    }

    /// Input throughput in MiB per second
    pub fn throughput_mib_per_sec(&self) -> f64 {
        if self.processing_time_ms == 0 {
            0.0
        } else {
            (self.bytes_read as f64 / (1024.0 * 1024.0))
                / (self.processing_time_ms as f64 / 1000.0)
        }
    }

    /// One-line human readable summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} lines in {} chunks -> {} stations | rejected: {} ({:.2}% accepted) | \
             {} emissions from {} workers | {:.1} MiB/s",
            self.lines_read,
            self.chunks_read,
            self.stations,
            self.lines_rejected,
            self.acceptance_rate(),
            self.emissions,
            self.workers,
            self.throughput_mib_per_sec()
        )
    }
}
