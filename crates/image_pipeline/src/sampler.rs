use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// A `Sampler` defines the order in which dataset indices are visited.
///
/// `iter(epoch)` returns the sequence for that epoch. Randomized samplers mix
/// the epoch into their seed so every pass gets a fresh but reproducible
/// permutation.
///
/// Implementations must be `Send + Sync` so a sampler can live inside a
/// `DataLoader` that is shared across threads.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    type Item = S::Item;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        (**self).iter(epoch)
    }
}

/// ============================================================================
/// Yields indices in order `(0, 1, 2, ..., dataset_size - 1)` every epoch.
///
/// # Examples
/// ```ignore
/// let sampler = SequentialSampler::new(5);
/// let indices: Vec<_> = sampler.iter(0).collect();
/// assert_eq!(indices, vec![0, 1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    dataset_size: usize,
}

impl SequentialSampler {
    pub fn new(dataset_size: usize) -> Self {
        Self { dataset_size }
    }
}

impl Sampler for SequentialSampler {
    type Item = usize;

    fn iter(&self, _epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(0..self.dataset_size)
    }
}

/// ============================================================================
/// A permutation of `0..dataset_size` per epoch, without replacement.
///
/// The RNG for epoch `e` is `StdRng::seed_from_u64(base_seed + e)`: the same
/// `base_seed` reproduces the same sequence of permutations, and consecutive
/// epochs see different orders.
///
/// # Example
/// ```ignore
/// let sampler = RandomSampler::new(1000, 42)?;
/// let first: Vec<_> = sampler.iter(0).collect();
/// ```
#[derive(Debug, Clone)]
pub struct RandomSampler {
    dataset_size: usize,
    base_seed: u64,
}

impl RandomSampler {
    pub fn new(dataset_size: usize, base_seed: u64) -> Result<Self> {
        ensure!(
            dataset_size > 0,
            "RandomSampler needs a non-empty dataset, but got dataset_size={}",
            dataset_size
        );
        Ok(Self {
            dataset_size,
            base_seed,
        })
    }

    #[inline]
    fn derive_rng_for_epoch(&self, epoch: usize) -> StdRng {
        StdRng::seed_from_u64(self.base_seed.wrapping_add(epoch as u64))
    }
}

impl Sampler for RandomSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut rng = self.derive_rng_for_epoch(epoch);
        let mut indices: Vec<_> = (0..self.dataset_size).collect();
        indices.shuffle(&mut rng);
        Box::new(indices.into_iter())
    }
}

/// ============================================================================
/// Groups the items of an underlying sampler into mini-batches.
///
/// If `drop_last` is `true`, a final mini-batch smaller than `batch_size`
/// is discarded.
///
/// # Example
/// ```ignore
/// let batch_sampler = BatchSampler::new(SequentialSampler::new(10), 4, false)?;
/// // [0, 1, 2, 3], [4, 5, 6, 7], [8, 9]
/// ```
#[derive(Debug, Clone)]
pub struct BatchSampler<S> {
    sampler: S,
    batch_size: usize,
    drop_last: bool,
}

impl<S: Sampler> BatchSampler<S> {
    pub fn new(sampler: S, batch_size: usize, drop_last: bool) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        Ok(Self {
            sampler,
            batch_size,
            drop_last,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of mini-batches a pass over `dataset_size` items produces.
    pub fn num_batches(&self, dataset_size: usize) -> usize {
        if self.drop_last {
            dataset_size / self.batch_size
        } else {
            dataset_size.div_ceil(self.batch_size)
        }
    }
}

impl<S: Sampler> Sampler for BatchSampler<S> {
    type Item = Vec<S::Item>;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        let mut sampler_iter = self.sampler.iter(epoch);
        let batch_size = self.batch_size;
        let drop_last = self.drop_last;

        Box::new(std::iter::from_fn(move || {
            let mini_batch: Vec<_> = sampler_iter.by_ref().take(batch_size).collect();
            if mini_batch.len() == batch_size || (!drop_last && !mini_batch.is_empty()) {
                Some(mini_batch)
            } else {
                None
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const TEST_SEED: u64 = 42;
    const TEST_DATASET_SIZE: usize = 100;

    mod sequential_sampler_tests {
        use super::*;

        #[test]
        fn yields_sequential_indices() {
            let sampler = SequentialSampler::new(100);
            let indices: Vec<usize> = sampler.iter(3).collect();
            assert_eq!(indices, (0..100).collect::<Vec<_>>());
        }

        #[test]
        fn handles_empty_dataset() {
            let sampler = SequentialSampler::new(0);
            assert_eq!(sampler.iter(0).count(), 0);
        }
    }

    mod random_sampler_tests {
        use super::*;

        #[test]
        fn validates_parameters() {
            assert!(RandomSampler::new(10, TEST_SEED).is_ok());
            assert!(RandomSampler::new(0, TEST_SEED).is_err());
        }

        #[test]
        fn contains_all_indices() {
            let sampler = RandomSampler::new(TEST_DATASET_SIZE, TEST_SEED).unwrap();
            let samples: Vec<_> = sampler.iter(0).collect();
            assert_eq!(samples.len(), TEST_DATASET_SIZE);
            assert_eq!(HashSet::<_>::from_iter(samples).len(), TEST_DATASET_SIZE);
        }

        #[test]
        fn produces_deterministic_results() {
            let sampler = RandomSampler::new(TEST_DATASET_SIZE, TEST_SEED).unwrap();
            let epoch1 = sampler.iter(1).collect::<Vec<_>>();
            assert_eq!(epoch1, sampler.iter(1).collect::<Vec<_>>());
            assert_ne!(epoch1, sampler.iter(2).collect::<Vec<_>>());

            let twin = RandomSampler::new(TEST_DATASET_SIZE, TEST_SEED).unwrap();
            assert_eq!(epoch1, twin.iter(1).collect::<Vec<_>>());
        }
    }

    mod batch_sampler_tests {
        use super::*;

        #[test]
        fn test_batches_full() {
            let batch_sampler = BatchSampler::new(SequentialSampler::new(10), 2, false).unwrap();
            let mini_batches: Vec<_> = batch_sampler.iter(0).collect();
            assert_eq!(
                mini_batches,
                vec![vec![0, 1], vec![2, 3], vec![4, 5], vec![6, 7], vec![8, 9]]
            );
            assert_eq!(batch_sampler.num_batches(10), 5);
        }

        #[test]
        fn test_batches_partial_and_drop_last() {
            let keep = BatchSampler::new(SequentialSampler::new(10), 3, false).unwrap();
            assert_eq!(keep.iter(0).last(), Some(vec![9]));
            assert_eq!(keep.num_batches(10), 4);

            let drop = BatchSampler::new(SequentialSampler::new(10), 3, true).unwrap();
            let mini_batches: Vec<_> = drop.iter(0).collect();
            assert_eq!(
                mini_batches,
                vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]
            );
            assert_eq!(drop.num_batches(10), 3);
        }

        #[test]
        fn test_boxed_sampler() {
            let boxed: Box<dyn Sampler<Item = usize>> =
                Box::new(RandomSampler::new(7, TEST_SEED).unwrap());
            let batch_sampler = BatchSampler::new(boxed, 4, false).unwrap();
            let flat: HashSet<usize> = batch_sampler.iter(0).flatten().collect();
            assert_eq!(flat, (0..7).collect());
        }

        #[test]
        fn rejects_zero_batch_size() {
            assert!(BatchSampler::new(SequentialSampler::new(4), 0, false).is_err());
        }
    }
}
