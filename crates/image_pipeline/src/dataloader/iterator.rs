//! src/dataloader/iterator.rs
//!
//! Iteration logic that turns sampler output into batches.
//!
//! - `DataLoaderIter`: the public iterator returned by `DataLoader::iter()`
//! - `IteratorImpl`: `Single` (load on the calling thread) or `Multi`
//!   (fresh worker pool for this epoch)

use crate::batch::ImageBatch;
use crate::dataset::Dataset;
use crate::random::swap_worker_rng;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use std::time::Duration;

use super::workers::pool::WorkerPool;
use super::workers::{load_batch, BatchTask};

pub(crate) type BatchIndices<'a> = Box<dyn Iterator<Item = Vec<usize>> + Send + 'a>;

/// Iterator over batches of one epoch.
///
/// Created by calling `dataloader.iter()`. Dropping it mid-epoch shuts down
/// and joins any worker threads it owns.
pub struct DataLoaderIter<'a, D> {
    pub(crate) inner: IteratorImpl<'a, D>,
}

pub(crate) enum IteratorImpl<'a, D> {
    /// Single-threaded iteration.
    /// - `rng`: this epoch's stream, seeded like worker 0 when a seed is set.
    ///   Installed on the calling thread only while a batch loads.
    Single {
        dataset: &'a D,
        batch_indices: BatchIndices<'a>,
        rng: Option<StdRng>,
    },

    /// Multi-threaded iteration with workers spawned for this epoch.
    /// - `max_pending`: `num_workers x prefetch_factor`
    /// - `sent` / `received`: batch counters; batch `k` belongs to worker `k % n`
    /// - `finished`: set after the first receive failure
    Multi {
        pool: WorkerPool<BatchTask, Result<ImageBatch>>,
        batch_indices: BatchIndices<'a>,
        timeout: Duration,
        max_pending: usize,
        sent: usize,
        received: usize,
        finished: bool,
    },
}

impl<D: Dataset> Iterator for DataLoaderIter<'_, D> {
    type Item = Result<ImageBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IteratorImpl::Single {
                dataset,
                batch_indices,
                rng,
            } => {
                let indices = batch_indices.next()?;

                let caller_rng = swap_worker_rng(rng.take());
                let result = load_batch(*dataset, &indices);
                *rng = swap_worker_rng(caller_rng);

                Some(result.context("Failed to load batch in single-threaded mode"))
            }

            IteratorImpl::Multi {
                pool,
                batch_indices,
                timeout,
                max_pending,
                sent,
                received,
                finished,
            } => {
                if *finished {
                    return None;
                }
                let num_workers = pool.num_workers();

                // Keep the pipeline full
                while *sent - *received < *max_pending {
                    let Some(indices) = batch_indices.next() else {
                        break;
                    };
                    let worker_id = *sent % num_workers;
                    let task = BatchTask {
                        batch_index: *sent,
                        indices,
                    };
                    if let Err(e) = pool.send(worker_id, task) {
                        *finished = true;
                        return Some(Err(e.context(format!(
                            "Failed to send batch {} to worker {}",
                            *sent, worker_id
                        ))));
                    }
                    *sent += 1;
                }

                if *received == *sent {
                    return None;
                }

                let worker_id = *received % num_workers;
                match pool.recv(worker_id, *timeout) {
                    Ok(result) => {
                        *received += 1;
                        Some(result)
                    }
                    Err(e) => {
                        *finished = true;
                        Some(Err(e.context(format!(
                            "Failed to receive batch {} (pending: {})",
                            *received,
                            *sent - *received
                        ))))
                    }
                }
            }
        }
    }
}
