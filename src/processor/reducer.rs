//! Reduction of worker emissions into the global summary table.
//!
//! A single task owns the global table and merges emissions while workers
//! are still running. The merge is associative and commutative, but f64
//! addition is not, so emissions are committed in (sequence, worker) order
//! to keep sums bit-identical from run to run.

use super::worker::WorkerEmission;
use crate::error::{AggregatorError, Result};
use crate::models::{SummaryTable, merge_tables};

use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Everything the reducer accumulated over a run
#[derive(Debug, Default)]
pub struct Reduction {
    pub table: SummaryTable,
    pub emissions: usize,
    pub records: u64,
    pub rejected: u64,
}

impl Reduction {
    /// Merge one emission into the totals
    pub fn absorb(&mut self, emission: WorkerEmission) {
        self.emissions += 1;
        self.records += emission.records;
        self.rejected += emission.rejected;
        merge_tables(&mut self.table, emission.table);
    }
}

/// Fold a finite set of emissions, e.g. in a chosen order
pub fn reduce<I>(emissions: I) -> Reduction
where
    I: IntoIterator<Item = WorkerEmission>,
{
    let mut reduction = Reduction::default();
    for emission in emissions {
        reduction.absorb(emission);
    }
    reduction
}

/// Buffers out-of-order emissions and commits them in a fixed order
#[derive(Debug)]
pub struct OrderedReduction {
    workers: usize,
    next: (u64, usize),
    pending: BTreeMap<(u64, usize), WorkerEmission>,
    reduction: Reduction,
}

impl OrderedReduction {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            next: (0, 0),
            pending: BTreeMap::new(),
            reduction: Reduction::default(),
        }
    }

    /// Accept an emission and commit everything that is now in order
    pub fn push(&mut self, emission: WorkerEmission) {
        self.pending
            .insert((emission.sequence, emission.worker), emission);

        while let Some(emission) = self.pending.remove(&self.next) {
            self.reduction.absorb(emission);
            self.advance();
        }
    }

    /// Emissions received but not yet merged
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn advance(&mut self) {
        let (sequence, worker) = self.next;
        self.next = if worker + 1 >= self.workers {
            (sequence + 1, 0)
        } else {
            (sequence, worker + 1)
        };
    }

    /// Merge any stragglers in key order and return the totals
    pub fn finish(mut self) -> Reduction {
        for (_, emission) in std::mem::take(&mut self.pending) {
            self.reduction.absorb(emission);
        }
        self.reduction
    }
}

/// Handle to the running reducer task
#[derive(Debug)]
pub struct Reducer {
    handle: JoinHandle<Reduction>,
}

impl Reducer {
    /// Start consuming `emissions` from a pool of `workers` until every
    /// sender is dropped
    pub fn spawn(mut emissions: mpsc::Receiver<WorkerEmission>, workers: usize) -> Self {
        let handle = tokio::spawn(async move {
            let mut ordered = OrderedReduction::new(workers);
            while let Some(emission) = emissions.recv().await {
                debug!(
                    "Received emission {} from worker {} ({} stations)",
                    emission.sequence,
                    emission.worker,
                    emission.table.len()
                );
                ordered.push(emission);
            }
            ordered.finish()
        });

        Self { handle }
    }

    /// Wait for the channel to close and return the global table
    pub async fn finish(self) -> Result<Reduction> {
        self.handle
            .await
            .map_err(|e| AggregatorError::reducer_failed(e.to_string()))
    }
}
