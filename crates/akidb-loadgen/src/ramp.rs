//! Linear ramp-up schedule
//!
//! Load starts at a 10% floor of the configured maximum and grows linearly
//! until it reaches the maximum exactly at the end of the phase.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Absolute floor for the starting worker count.
pub const MIN_START_WORKERS: usize = 1;

/// Absolute floor for the starting batch size.
pub const MIN_START_BATCH: usize = 100;

/// Effective load at one point of the ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampState {
    /// Advisory worker count. The pool itself is sized once per phase.
    pub workers: usize,

    /// Batch size to use for the next unit of work.
    pub batch_size: usize,
}

/// Ramp parameters for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampSchedule {
    total: Duration,
    max_workers: usize,
    max_batch: usize,
}

impl RampSchedule {
    /// Zero maxima are treated as 1.
    #[must_use]
    pub fn new(total: Duration, max_workers: usize, max_batch: usize) -> Self {
        Self {
            total,
            max_workers: max_workers.max(1),
            max_batch: max_batch.max(1),
        }
    }

    /// Starting point of the ramp (`elapsed = 0`).
    #[must_use]
    pub fn start(&self) -> RampState {
        RampState {
            workers: start_value(self.max_workers, MIN_START_WORKERS),
            batch_size: start_value(self.max_batch, MIN_START_BATCH),
        }
    }

    /// Effective load after `elapsed` of a phase lasting `total`.
    ///
    /// Starts at 10% of each maximum, floored at 1 worker and 100 vectors.
    /// The floor is itself capped at the maximum, so a phase with
    /// `max_batch < 100` runs at `max_batch` from the first batch.
    #[must_use]
    pub fn at(&self, elapsed: Duration) -> RampState {
        if elapsed >= self.total {
            return RampState {
                workers: self.max_workers,
                batch_size: self.max_batch,
            };
        }

        let progress = (elapsed.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0);
        let start = self.start();

        RampState {
            workers: interpolate(start.workers, self.max_workers, progress),
            batch_size: interpolate(start.batch_size, self.max_batch, progress),
        }
    }
}

/// Convenience wrapper over [`RampSchedule::at`].
#[must_use]
pub fn effective_load(
    elapsed: Duration,
    total: Duration,
    max_workers: usize,
    max_batch: usize,
) -> RampState {
    RampSchedule::new(total, max_workers, max_batch).at(elapsed)
}

// 10% of max, never below `floor`, never above max.
fn start_value(max: usize, floor: usize) -> usize {
    (max / 10).max(floor).min(max)
}

fn interpolate(start: usize, max: usize, progress: f64) -> usize {
    let span = max.saturating_sub(start) as f64;
    (start + (span * progress) as usize).min(max)
}
