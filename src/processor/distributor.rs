//! Work distribution over a long-lived worker pool.
//!
//! The pool is spawned once per run. For every chunk the distributor splits
//! the lines into one contiguous sub-batch per worker and queues them; the
//! bounded queues let the reader move on to the next chunk while workers
//! are still busy with this one.
//!
//! Workers run on their own OS threads rather than tokio's blocking pool,
//! which is capped and would leave workers past the cap unstarted.

use super::worker::{AggregationWorker, WorkerEmission, WorkerMessage};
use crate::config::EmissionPolicy;
use crate::error::{AggregatorError, Result};
use crate::models::Chunk;

use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, trace};

/// Split `lines` into exactly `workers` contiguous batches of
/// `ceil(N / workers)` lines; trailing batches may be short or empty
pub fn partition(lines: Vec<String>, workers: usize) -> Vec<Vec<String>> {
    let workers = workers.max(1);
    let batch_size = lines.len().div_ceil(workers);

    let mut remaining = lines.into_iter();
    (0..workers)
        .map(|_| remaining.by_ref().take(batch_size).collect())
        .collect()
}

/// Fixed-size pool of aggregation workers
#[derive(Debug)]
pub struct WorkerPool {
    senders: Vec<mpsc::Sender<WorkerMessage>>,
    handles: Vec<JoinHandle<Result<()>>>,
    policy: EmissionPolicy,
}

impl WorkerPool {
    /// Start `workers` worker threads that report to `emissions`
    pub fn spawn(
        workers: usize,
        queue_depth: usize,
        policy: EmissionPolicy,
        emissions: mpsc::Sender<WorkerEmission>,
    ) -> Result<Self> {
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let (sender, inbox) = mpsc::channel(queue_depth.max(1));
            let worker = AggregationWorker::new(id, policy, inbox, emissions.clone());
            let handle = thread::Builder::new()
                .name(format!("aggregation-worker-{}", id))
                .spawn(move || worker.run())
                .map_err(|e| {
                    AggregatorError::worker_failed(id, format!("could not start thread: {}", e))
                })?;
            handles.push(handle);
            senders.push(sender);
        }

        debug!(
            "Spawned worker pool: {} workers, queue depth {}, {:?} emission",
            workers, queue_depth, policy
        );

        Ok(Self {
            senders,
            handles,
            policy,
        })
    }

    pub fn size(&self) -> usize {
        self.senders.len()
    }

    /// Queue one chunk's sub-batches, waiting while worker queues are full
    pub async fn dispatch(&self, chunk: Chunk) -> Result<()> {
        let index = chunk.index;
        let batches = partition(chunk.lines, self.size());

        for (worker, (sender, batch)) in self.senders.iter().zip(batches).enumerate() {
            if !batch.is_empty() {
                trace!("Chunk {}: {} lines to worker {}", index, batch.len(), worker);
                sender
                    .send(WorkerMessage::Batch(batch))
                    .await
                    .map_err(|_| AggregatorError::worker_failed(worker, "worker queue closed"))?;
            }

            if self.policy == EmissionPolicy::PerChunk {
                sender
                    .send(WorkerMessage::Flush)
                    .await
                    .map_err(|_| AggregatorError::worker_failed(worker, "worker queue closed"))?;
            }
        }

        Ok(())
    }

    /// Close every queue and wait for all workers to finish and emit
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            senders, handles, ..
        } = self;
        drop(senders);

        // Joining blocks, so it happens off the async workers
        let joined = task::spawn_blocking(move || {
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| AggregatorError::worker_failed(0, e.to_string()))?;

        for (worker, outcome) in joined.into_iter().enumerate() {
            match outcome {
                Ok(result) => result?,
                Err(_) => return Err(AggregatorError::worker_failed(worker, "worker panicked")),
            }
        }

        debug!("Worker pool drained");
        Ok(())
    }
}
