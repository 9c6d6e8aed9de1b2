//! Worker-side batch loading.
//!
//! - `pool`: per-worker channel thread pool
//! - [`BatchTask`] / [`load_batch`]: what a worker does with a list of indices

pub(crate) mod pool;

use crate::batch::ImageBatch;
use crate::dataset::Dataset;
use anyhow::{Context, Result};

/// One mini-batch worth of dataset indices, in sampler order.
#[derive(Debug)]
pub(crate) struct BatchTask {
    pub(crate) batch_index: usize,
    pub(crate) indices: Vec<usize>,
}

/// Fetches every sample on demand and stacks them into an [`ImageBatch`].
///
/// Shared by the single-threaded iterator and the worker threads.
pub(crate) fn load_batch<D: Dataset + ?Sized>(dataset: &D, indices: &[usize]) -> Result<ImageBatch> {
    let samples = indices
        .iter()
        .map(|&index| {
            dataset.get_sample(index).with_context(|| {
                format!(
                    "Failed to load sample at index {} (dataset size: {})",
                    index,
                    dataset.len()
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    ImageBatch::collate(samples)
        .with_context(|| format!("Failed to collate batch of {} samples", indices.len()))
}
