//! src/dataloader/loader.rs
//!
//! The `DataLoader` owns a dataset, a batch sampler and the loading
//! configuration, and hands out one [`DataLoaderIter`] per epoch.
//!
//! # Sampling
//! - `shuffle = false`: `SequentialSampler`, the same order every epoch.
//! - `shuffle = true`: `RandomSampler` seeded with `config.seed` (or a random
//!   seed drawn once at construction), a new permutation every epoch.
//!
//! # Seed Coordination
//! `config.seed` also seeds the per-thread worker RNG as
//! `seed + (epoch << 32) + worker_id`, so randomized transforms drawing from
//! `RandomSource::Worker` replay identically for the same seed, epoch and
//! worker count.

use crate::batch::{BatchSource, ImageBatch};
use crate::dataset::Dataset;
use crate::random::{init_worker_rng, worker_rng};
use crate::sampler::{BatchSampler, RandomSampler, Sampler, SequentialSampler};
use anyhow::{ensure, Context, Result};
use crossbeam_channel::RecvTimeoutError;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::config::DataLoaderConfig;
use super::iterator::{DataLoaderIter, IteratorImpl};
use super::workers::pool::WorkerPool;
use super::workers::{load_batch, BatchTask};

/// Coordinates a [`Dataset`], a sampler and optional worker threads.
///
/// # Thread safety:
/// - `DataLoader` is `Send + Sync`; the dataset is shared with workers via `Arc`.
/// - Iterators borrow the loader and are used on a single thread.
pub struct DataLoader<D> {
    dataset: Arc<D>,
    batch_sampler: BatchSampler<Box<dyn Sampler<Item = usize>>>,
    config: DataLoaderConfig,
    current_epoch: AtomicUsize,
}

impl<D: Dataset + 'static> DataLoader<D> {
    /// Creates a DataLoader that picks its sampler from `config.shuffle`.
    ///
    /// # Errors
    /// - `batch_size` is 0
    /// - `prefetch_factor` is 0 when using workers
    /// - `shuffle = true` on an empty dataset
    ///
    /// # Example
    /// ```ignore
    /// let config = DataLoaderConfig::builder()
    ///     .batch_size(32)
    ///     .shuffle(true)
    ///     .seed(42)
    ///     .build();
    /// let dataloader = DataLoader::new(dataset, config)?;
    /// ```
    pub fn new(dataset: D, config: DataLoaderConfig) -> Result<Self> {
        ensure!(config.batch_size > 0, "Batch size must be greater than 0");
        ensure!(
            config.prefetch_factor > 0 || config.num_workers == 0,
            "Prefetch factor must be > 0 when using {} workers",
            config.num_workers
        );

        let sampler: Box<dyn Sampler<Item = usize>> = if config.shuffle {
            let sampler_seed = config.seed.unwrap_or_else(|| rand::rng().random());
            Box::new(RandomSampler::new(dataset.len(), sampler_seed)?)
        } else {
            Box::new(SequentialSampler::new(dataset.len()))
        };

        let batch_sampler = BatchSampler::new(sampler, config.batch_size, config.drop_last)
            .context("Failed to wrap sampler with BatchSampler")?;

        Ok(Self {
            dataset: Arc::new(dataset),
            batch_sampler,
            config,
            current_epoch: AtomicUsize::new(0),
        })
    }

    /// Creates an iterator over the batches of the next epoch.
    ///
    /// Every call advances the epoch counter. With workers configured, a
    /// fresh pool is spawned for this epoch and torn down when the iterator
    /// is dropped.
    pub fn iter(&self) -> Result<DataLoaderIter<'_, D>> {
        let epoch = self.current_epoch.fetch_add(1, Ordering::SeqCst);
        let sampler_epoch = if self.config.shuffle { epoch } else { 0 };
        let batch_indices = self.batch_sampler.iter(sampler_epoch);
        let runtime_seed = self.config.seed;

        let inner = if self.config.num_workers == 0 {
            IteratorImpl::Single {
                dataset: self.dataset.as_ref(),
                batch_indices,
                rng: runtime_seed.map(|seed| worker_rng(0, epoch, seed)),
            }
        } else {
            let pool = self
                .spawn_workers(epoch)
                .context("Failed to create worker pool")?;
            debug!(
                num_workers = self.config.num_workers,
                epoch, "Spawned dataloader workers"
            );
            IteratorImpl::Multi {
                pool,
                batch_indices,
                timeout: self.config.timeout,
                max_pending: self.config.num_workers * self.config.prefetch_factor,
                sent: 0,
                received: 0,
                finished: false,
            }
        };

        Ok(DataLoaderIter { inner })
    }

    fn spawn_workers(&self, epoch: usize) -> Result<WorkerPool<BatchTask, Result<ImageBatch>>> {
        let dataset = self.dataset.clone();
        let runtime_seed = self.config.seed;
        let worker_timeout = self.config.worker_timeout;

        WorkerPool::new(
            self.config.num_workers,
            self.config.prefetch_factor,
            move |worker_id, task_rx, output_tx, shutdown| {
                if let Some(base_seed) = runtime_seed {
                    init_worker_rng(worker_id, epoch, base_seed);
                }

                while !shutdown.load(Ordering::Relaxed) {
                    match task_rx.recv_timeout(worker_timeout) {
                        Ok(task) => {
                            let result = load_batch(dataset.as_ref(), &task.indices)
                                .with_context(|| {
                                    format!(
                                        "Worker {} failed to process batch {}",
                                        worker_id, task.batch_index
                                    )
                                });
                            if output_tx.send(result).is_err() {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            },
        )
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    /// Number of samples in the underlying dataset.
    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    /// Number of batches per epoch.
    pub fn len(&self) -> usize {
        self.batch_sampler.num_batches(self.dataset.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of epochs started so far.
    pub fn epoch(&self) -> usize {
        self.current_epoch.load(Ordering::SeqCst)
    }
}

impl<D: Dataset + 'static> BatchSource for DataLoader<D> {
    fn batches(&self) -> Result<Box<dyn Iterator<Item = Result<ImageBatch>> + '_>> {
        Ok(Box::new(self.iter()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::LabeledImage;
    use crate::random::{RandomSource, WORKER_RNG};
    use anyhow::bail;
    use std::time::Duration;
    use tch::{Device, Kind, Tensor};

    /// Sample `i` is a `[3, 2, 2]` tensor filled with `i`, labelled `i % 2`.
    struct CountingDataset {
        size: usize,
    }

    impl Dataset for CountingDataset {
        fn len(&self) -> usize {
            self.size
        }

        fn get_sample(&self, index: usize) -> Result<LabeledImage> {
            if index >= self.size {
                bail!("index {} out of range", index);
            }
            Ok(LabeledImage::new(
                Tensor::full(&[3, 2, 2], index as f64, (Kind::Float, Device::Cpu)),
                (index % 2) as i64,
            ))
        }
    }

    /// Every sample draws one value from the worker RNG.
    struct NoisyDataset;

    impl Dataset for NoisyDataset {
        fn len(&self) -> usize {
            12
        }

        fn get_sample(&self, _index: usize) -> Result<LabeledImage> {
            let value = RandomSource::Worker.gen_f64(0.0..=1.0);
            Ok(LabeledImage::new(
                Tensor::full(&[1], value, (Kind::Double, Device::Cpu)),
                0,
            ))
        }
    }

    struct FailingDataset;

    impl Dataset for FailingDataset {
        fn len(&self) -> usize {
            4
        }

        fn get_sample(&self, index: usize) -> Result<LabeledImage> {
            bail!("corrupt file at {}", index)
        }
    }

    fn noise_draws(loader: &DataLoader<NoisyDataset>) -> Result<Vec<f64>> {
        let mut values = Vec::new();
        for batch in loader.iter()? {
            let batch = batch?;
            values.extend(Vec::<f64>::try_from(batch.images.flatten(0, -1))?);
        }
        Ok(values)
    }

    fn first_values(loader: &DataLoader<impl Dataset + 'static>) -> Result<Vec<f64>> {
        loader
            .iter()?
            .map(|batch| {
                let batch = batch?;
                Ok((0..batch.len())
                    .map(|i| batch.images.double_value(&[i as i64, 0, 0, 0]))
                    .collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>>>()
            .map(|batches| batches.concat())
    }

    #[test]
    fn test_sequential_batches() -> Result<()> {
        let config = DataLoaderConfig::builder().batch_size(4).build();
        let loader = DataLoader::new(CountingDataset { size: 10 }, config)?;
        assert_eq!(loader.len(), 3);
        assert_eq!(loader.num_samples(), 10);

        let batches: Vec<ImageBatch> = loader.iter()?.collect::<Result<_>>()?;
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(batches[0].images.size(), vec![4, 3, 2, 2]);
        assert_eq!(batches[2].label_vec()?, vec![0, 1]);
        assert_eq!(
            first_values(&loader)?,
            (0..10).map(|i| i as f64).collect::<Vec<_>>()
        );
        Ok(())
    }

    #[test]
    fn test_drop_last() -> Result<()> {
        let config = DataLoaderConfig::builder()
            .batch_size(4)
            .drop_last(true)
            .build();
        let loader = DataLoader::new(CountingDataset { size: 10 }, config)?;
        assert_eq!(loader.len(), 2);
        assert_eq!(loader.iter()?.count(), 2);
        Ok(())
    }

    #[test]
    fn test_shuffle_changes_per_epoch_and_replays_with_seed() -> Result<()> {
        let make = || {
            let config = DataLoaderConfig::builder()
                .batch_size(5)
                .shuffle(true)
                .seed(7)
                .build();
            DataLoader::new(CountingDataset { size: 20 }, config)
        };

        let loader = make()?;
        let epoch0 = first_values(&loader)?;
        let epoch1 = first_values(&loader)?;
        assert_ne!(epoch0, epoch1);
        assert_eq!(loader.epoch(), 2);

        let mut sorted = epoch0.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(sorted, (0..20).map(|i| i as f64).collect::<Vec<_>>());

        let replay = make()?;
        assert_eq!(first_values(&replay)?, epoch0);
        assert_eq!(first_values(&replay)?, epoch1);
        Ok(())
    }

    #[test]
    fn test_workers_preserve_order() -> Result<()> {
        let config = DataLoaderConfig::builder()
            .batch_size(3)
            .num_workers(3)
            .prefetch_factor(1)
            .build();
        let loader = DataLoader::new(CountingDataset { size: 17 }, config)?;
        assert_eq!(
            first_values(&loader)?,
            (0..17).map(|i| i as f64).collect::<Vec<_>>()
        );
        Ok(())
    }

    #[test]
    fn test_worker_rng_is_reproducible() -> Result<()> {
        let make = || {
            let config = DataLoaderConfig::builder()
                .batch_size(2)
                .num_workers(2)
                .seed(1234)
                .build();
            DataLoader::new(NoisyDataset, config)
        };

        let a = make()?;
        let b = make()?;
        let a0 = noise_draws(&a)?;
        assert_eq!(a0, noise_draws(&b)?);
        assert_ne!(a0, noise_draws(&a)?); // next epoch reseeds differently
        Ok(())
    }

    fn noisy_loader(seed: Option<u64>) -> Result<DataLoader<NoisyDataset>> {
        let mut config = DataLoaderConfig::builder().batch_size(3);
        if let Some(seed) = seed {
            config = config.seed(seed);
        }
        DataLoader::new(NoisyDataset, config.build())
    }

    #[test]
    fn test_seeded_single_thread_does_not_leak_into_unseeded() -> Result<()> {
        let run = || -> Result<Vec<f64>> {
            noise_draws(&noisy_loader(Some(5))?)?;
            assert!(WORKER_RNG.with(|cell| cell.borrow().is_none()));
            noise_draws(&noisy_loader(None)?)
        };

        let a = std::thread::spawn(run).join().unwrap()?;
        let b = std::thread::spawn(run).join().unwrap()?;
        assert_ne!(a, b);
        Ok(())
    }

    #[test]
    fn test_interleaved_seeded_iterators_keep_their_streams() -> Result<()> {
        let expected = noise_draws(&noisy_loader(Some(8))?)?;

        let left = noisy_loader(Some(8))?;
        let right = noisy_loader(Some(8))?;
        let (mut a, mut b) = (Vec::new(), Vec::new());
        for (x, y) in left.iter()?.zip(right.iter()?) {
            a.extend(Vec::<f64>::try_from(x?.images.flatten(0, -1))?);
            b.extend(Vec::<f64>::try_from(y?.images.flatten(0, -1))?);
        }
        assert_eq!(a, expected);
        assert_eq!(b, expected);
        Ok(())
    }

    #[test]
    fn test_errors_surface_per_batch() -> Result<()> {
        for num_workers in [0, 2] {
            let config = DataLoaderConfig::builder()
                .batch_size(2)
                .num_workers(num_workers)
                .timeout(Duration::from_secs(10))
                .build();
            let loader = DataLoader::new(FailingDataset, config)?;
            let first = loader.iter()?.next();
            assert!(matches!(first, Some(Err(_))));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        let zero_batch = DataLoaderConfig::builder().batch_size(0).build();
        assert!(DataLoader::new(CountingDataset { size: 3 }, zero_batch).is_err());

        let zero_prefetch = DataLoaderConfig::builder()
            .num_workers(2)
            .prefetch_factor(0)
            .build();
        assert!(DataLoader::new(CountingDataset { size: 3 }, zero_prefetch).is_err());
    }

    #[test]
    fn test_early_drop_joins_workers() -> Result<()> {
        let config = DataLoaderConfig::builder()
            .batch_size(1)
            .num_workers(2)
            .build();
        let loader = DataLoader::new(CountingDataset { size: 50 }, config)?;
        let mut iter = loader.iter()?;
        assert!(iter.next().is_some());
        drop(iter);
        assert_eq!(loader.iter()?.count(), 50);
        Ok(())
    }
}
