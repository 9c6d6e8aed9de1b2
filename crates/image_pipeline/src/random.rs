//! Random number sources for augmentation.
//!
//! Every randomized transform owns a [`RandomSource`]. Two flavours exist:
//!
//! - [`RandomSource::Worker`] draws from a thread-local `StdRng`. The
//!   `DataLoader` seeds it per worker and per epoch when a seed is configured
//!   (`base_seed + (epoch << 32) + worker_id`); outside a seeded worker it
//!   falls back to `rand::rng()`.
//! - [`RandomSource::Seeded`] shares one explicitly seeded `StdRng` between
//!   all steps holding a clone of the handle. Draw order then depends on call
//!   order, so use it with `num_workers = 0` for exact reproducibility.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

thread_local! {
    /// Thread-local RNG for deterministic randomness in workers.
    pub static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// The generator worker `worker_id` uses in `epoch` for `base_seed`.
pub fn worker_rng(worker_id: usize, epoch: usize, base_seed: u64) -> StdRng {
    let seed = base_seed
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(worker_id as u64);
    StdRng::seed_from_u64(seed)
}

/// Initialize the current thread's RNG from worker id, epoch and base seed.
pub fn init_worker_rng(worker_id: usize, epoch: usize, base_seed: u64) {
    swap_worker_rng(Some(worker_rng(worker_id, epoch, base_seed)));
}

/// Drop the current thread's seeded RNG, reverting to `rand::rng()`.
pub fn clear_worker_rng() {
    swap_worker_rng(None);
}

/// Installs `rng` as the current thread's RNG and returns the previous one.
pub fn swap_worker_rng(rng: Option<StdRng>) -> Option<StdRng> {
    WORKER_RNG.with(|cell| cell.replace(rng))
}

/// Handle to the random stream a transform draws from.
#[derive(Debug, Clone, Default)]
pub enum RandomSource {
    #[default]
    Worker,
    Seeded(Arc<Mutex<StdRng>>),
}

impl RandomSource {
    /// Shared, explicitly seeded stream.
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))))
    }

    /// Runs `f` with exclusive access to the underlying generator.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut dyn RngCore) -> R) -> R {
        match self {
            Self::Worker => WORKER_RNG.with(|cell| {
                let mut slot = cell.borrow_mut();
                match slot.as_mut() {
                    Some(rng) => f(rng),
                    None => f(&mut rand::rng()),
                }
            }),
            Self::Seeded(shared) => {
                let mut rng = shared
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                f(&mut *rng)
            }
        }
    }

    pub fn gen_bool(&self, p: f64) -> bool {
        match p {
            p if p <= 0.0 => false,
            p if p >= 1.0 => true,
            p => self.with_rng(|rng| rng.random_bool(p)),
        }
    }

    pub fn gen_f64(&self, range: RangeInclusive<f64>) -> f64 {
        let (lo, hi) = range.into_inner();
        if lo >= hi {
            return lo;
        }
        self.with_rng(|rng| rng.random_range(lo..=hi))
    }

    /// Uniform integer in `0..=max`.
    pub fn gen_index(&self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.with_rng(|rng| rng.random_range(0..=max))
    }

    pub fn shuffle<T>(&self, items: &mut [T]) {
        use rand::seq::SliceRandom;
        self.with_rng(|rng| items.shuffle(rng))
    }
}
