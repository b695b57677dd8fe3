//! Per-worker random vector generation
//!
//! Every worker owns its own generator, seeded from the run seed and the
//! worker index, so a run with a fixed seed produces the same vectors on
//! every worker no matter how the runtime schedules them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic source of float vectors with values in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct VectorGenerator {
    rng: StdRng,
    dimension: usize,
}

impl VectorGenerator {
    #[must_use]
    pub fn new(seed: u64, dimension: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dimension,
        }
    }

    /// Generator for one worker of a run.
    #[must_use]
    pub fn for_worker(run_seed: u64, worker_id: usize, dimension: usize) -> Self {
        Self::new(worker_seed(run_seed, worker_id), dimension)
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn vector(&mut self) -> Vec<f32> {
        (0..self.dimension).map(|_| self.rng.gen::<f32>()).collect()
    }

    pub fn batch(&mut self, count: usize) -> Vec<Vec<f32>> {
        (0..count).map(|_| self.vector()).collect()
    }
}

/// SplitMix64 finalizer over the run seed and worker index.
#[must_use]
pub fn worker_seed(run_seed: u64, worker_id: usize) -> u64 {
    let mut z = run_seed
        .wrapping_add((worker_id as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
