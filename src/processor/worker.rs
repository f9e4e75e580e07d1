//! Aggregation workers.
//!
//! Each worker owns one local summary table and folds every line it is
//! handed into it. Workers share nothing; their tables only meet in the
//! reducer.

use crate::config::EmissionPolicy;
use crate::constants::{EXPECTED_STATIONS, FIELD_DELIMITER};
use crate::error::{AggregatorError, Result};
use crate::models::{Record, SummaryTable, fold_record};

use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Work sent from the distributor to one worker
#[derive(Debug)]
pub enum WorkerMessage {
    /// Contiguous lines from one chunk
    Batch(Vec<String>),
    /// The current chunk is fully dispatched; hand the local table over
    Flush,
}

/// A local table handed to the reducer, with the counters behind it
#[derive(Debug, Default)]
pub struct WorkerEmission {
    pub worker: usize,
    /// How many emissions this worker made before this one
    pub sequence: u64,
    pub table: SummaryTable,
    pub records: u64,
    pub rejected: u64,
}

/// Parse `station;value`. Anything else yields `None`.
///
/// Both fields must be non-empty, there must be exactly one delimiter, and
/// the value must parse to a finite f64.
#[inline]
pub fn parse_line(line: &str) -> Option<Record<'_>> {
    let (station, value) = line.split_once(FIELD_DELIMITER)?;
    if station.is_empty() || value.is_empty() || value.contains(FIELD_DELIMITER) {
        return None;
    }

    let value: f64 = value.parse().ok()?;
    value.is_finite().then_some(Record { station, value })
}

/// One member of the worker pool
#[derive(Debug)]
pub struct AggregationWorker {
    id: usize,
    policy: EmissionPolicy,
    inbox: mpsc::Receiver<WorkerMessage>,
    emissions: mpsc::Sender<WorkerEmission>,
    table: SummaryTable,
    records: u64,
    rejected: u64,
    sequence: u64,
}

impl AggregationWorker {
    pub fn new(
        id: usize,
        policy: EmissionPolicy,
        inbox: mpsc::Receiver<WorkerMessage>,
        emissions: mpsc::Sender<WorkerEmission>,
    ) -> Self {
        Self {
            id,
            policy,
            inbox,
            emissions,
            table: SummaryTable::with_capacity(EXPECTED_STATIONS),
            records: 0,
            rejected: 0,
            sequence: 0,
        }
    }

    /// Blocking receive loop. Must run on a dedicated thread, outside the
    /// async runtime.
    pub fn run(mut self) -> Result<()> {
        while let Some(message) = self.inbox.blocking_recv() {
            match message {
                WorkerMessage::Batch(lines) => self.process_lines(&lines),
                WorkerMessage::Flush => self.emit()?,
            }
        }

        if self.policy == EmissionPolicy::PerRun {
            self.emit()?;
        }

        debug!("Worker {} finished", self.id);
        Ok(())
    }

    /// Fold a sub-batch into the local table
    pub fn process_lines(&mut self, lines: &[String]) {
        for line in lines {
            match parse_line(line) {
                Some(record) => {
                    fold_record(&mut self.table, record);
                    self.records += 1;
                }
                None => self.rejected += 1,
            }
        }
    }

    /// Hand the local table to the reducer and start a fresh one
    fn emit(&mut self) -> Result<()> {
        let emission = WorkerEmission {
            worker: self.id,
            sequence: self.sequence,
            table: std::mem::replace(
                &mut self.table,
                SummaryTable::with_capacity(EXPECTED_STATIONS),
            ),
            records: std::mem::take(&mut self.records),
            rejected: std::mem::take(&mut self.rejected),
        };
        self.sequence += 1;

        trace!(
            "Worker {} emitting {} stations ({} records, {} rejected)",
            self.id,
            emission.table.len(),
            emission.records,
            emission.rejected
        );

        self.emissions
            .blocking_send(emission)
            .map_err(|_| AggregatorError::worker_failed(self.id, "reducer stopped receiving"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_lines() {
        assert_eq!(
            parse_line("Hamburg;12.0"),
            Some(Record {
                station: "Hamburg",
                value: 12.0
            })
        );
        assert_eq!(parse_line("St. John's;-15.7").map(|r| r.value), Some(-15.7));
        assert_eq!(parse_line("Zürich;0").map(|r| r.station), Some("Zürich"));
        assert_eq!(parse_line("Lima;1e1").map(|r| r.value), Some(10.0));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert_eq!(parse_line("BadLine"), None);
        assert_eq!(parse_line("X;notanumber"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line(";12.0"), None);
        assert_eq!(parse_line("Hamburg;"), None);
        assert_eq!(parse_line("a;1.0;2.0"), None);
        assert_eq!(parse_line("Hamburg; 12.0"), None);
    }

    #[test]
    fn test_parse_rejects_non_finite_values() {
        assert_eq!(parse_line("a;NaN"), None);
        assert_eq!(parse_line("a;inf"), None);
        assert_eq!(parse_line("a;-infinity"), None);
        assert_eq!(parse_line("a;1e400"), None);
    }

    #[test]
    fn test_process_lines_counts_records_and_rejects() {
        let (_tx, inbox) = mpsc::channel(1);
        let (emissions, _rx) = mpsc::channel(1);
        let mut worker = AggregationWorker::new(0, EmissionPolicy::PerRun, inbox, emissions);

        let lines: Vec<String> = ["Hamburg;12.0", "BadLine", "Hamburg;6.0", "X;notanumber"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        worker.process_lines(&lines);

        assert_eq!(worker.records, 2);
        assert_eq!(worker.rejected, 2);
        assert_eq!(worker.table.len(), 1);
        assert_eq!(worker.table["Hamburg"].min, 6.0);
    }

    #[test]
    fn test_run_emits_once_per_run() {
        let (tx, inbox) = mpsc::channel(4);
        let (emissions, mut rx) = mpsc::channel(4);
        let worker = AggregationWorker::new(7, EmissionPolicy::PerRun, inbox, emissions);

        tx.blocking_send(WorkerMessage::Batch(vec!["a;1.0".into(), "a;3.0".into()]))
            .unwrap();
        tx.blocking_send(WorkerMessage::Batch(vec!["b;2.0".into()]))
            .unwrap();
        drop(tx);

        worker.run().unwrap();

        let emission = rx.blocking_recv().unwrap();
        assert_eq!(emission.worker, 7);
        assert_eq!(emission.records, 3);
        assert_eq!(emission.table.len(), 2);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_run_emits_on_every_flush_per_chunk() {
        let (tx, inbox) = mpsc::channel(8);
        let (emissions, mut rx) = mpsc::channel(8);
        let worker = AggregationWorker::new(1, EmissionPolicy::PerChunk, inbox, emissions);

        tx.blocking_send(WorkerMessage::Batch(vec!["a;1.0".into()]))
            .unwrap();
        tx.blocking_send(WorkerMessage::Flush).unwrap();
        tx.blocking_send(WorkerMessage::Flush).unwrap();
        drop(tx);

        worker.run().unwrap();

        let first = rx.blocking_recv().unwrap();
        assert_eq!(first.table.len(), 1);
        assert_eq!(first.sequence, 0);
        let second = rx.blocking_recv().unwrap();
        assert!(second.table.is_empty());
        assert_eq!(second.sequence, 1);
        assert_eq!(second.records, 0);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_emit_fails_when_reducer_is_gone() {
        let (tx, inbox) = mpsc::channel(1);
        let (emissions, rx) = mpsc::channel(1);
        drop(rx);
        drop(tx);

        let worker = AggregationWorker::new(2, EmissionPolicy::PerRun, inbox, emissions);
        assert!(matches!(
            worker.run(),
            Err(AggregatorError::WorkerFailed { worker: 2, .. })
        ));
    }
}
