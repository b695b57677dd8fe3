//! Phase metrics collection
//!
//! Workers share a [`PhaseCounters`] through an `Arc` and bump it with atomic
//! adds. Sums commute, so the totals are exact regardless of how the workers
//! interleave. Readers (the progress reporter) take lock-free snapshots that
//! may be slightly stale but never go backwards.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Units completed divided by elapsed seconds; `0.0` when no time elapsed.
#[must_use]
pub fn throughput(units: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0.0;
    }
    units as f64 / secs
}

/// Shared counters for one phase.
#[derive(Debug, Default)]
pub struct PhaseCounters {
    units: AtomicU64,
    batches: AtomicU64,
    errors: AtomicU64,
    current_batch: AtomicUsize,
    peak_workers: AtomicUsize,
}

/// Point-in-time view of [`PhaseCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub units: u64,
    pub batches: u64,
    pub errors: u64,
    pub current_batch: usize,
    pub peak_workers: usize,
}

impl PhaseCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successful operation that processed `units` items.
    pub fn record_success(&self, units: u64) {
        self.units.fetch_add(units, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one failed operation. Failed units are never counted.
    pub fn record_failure(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed batch of which `units` items were still accepted.
    pub fn record_partial(&self, units: u64) {
        self.units.fetch_add(units, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Publishes the batch size and advisory worker count currently in use.
    pub fn observe_load(&self, batch_size: usize, workers: usize) {
        self.current_batch.store(batch_size, Ordering::Relaxed);
        self.peak_workers.fetch_max(workers, Ordering::Relaxed);
    }

    #[must_use]
    pub fn units(&self) -> u64 {
        self.units.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            units: self.units.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            current_batch: self.current_batch.load(Ordering::Relaxed),
            peak_workers: self.peak_workers.load(Ordering::Relaxed),
        }
    }
}

/// What a single worker did during a phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub worker_id: usize,

    /// Operations that succeeded.
    pub batches_completed: u64,

    /// Items processed by successful operations.
    pub units_completed: u64,

    /// Operations that failed.
    pub errors: u64,
}

/// Final metrics for one phase, produced after every worker joined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    /// Phase name.
    pub phase: String,

    /// Items processed (vectors inserted or searches performed).
    pub units: u64,

    /// Successful operations.
    pub batches: u64,

    /// Failed operations.
    pub errors: u64,

    /// Wall-clock time from pool start to the last join.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,

    /// Pool size.
    pub workers: usize,

    /// Highest advisory worker count reported by the ramp.
    pub peak_ramp_workers: usize,

    /// Per-worker breakdown, ordered by worker id.
    pub outcomes: Vec<WorkerOutcome>,
}

impl PhaseMetrics {
    /// Items per second over the phase.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        throughput(self.units, self.elapsed)
    }

    /// Failed operations over all attempted operations (0.0-1.0).
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        let attempted = self.batches + self.errors;
        if attempted == 0 {
            return 0.0;
        }
        self.errors as f64 / attempted as f64
    }

    /// Sum of per-worker units; equals `units` once the phase is complete.
    #[must_use]
    pub fn units_from_outcomes(&self) -> u64 {
        self.outcomes.iter().map(|o| o.units_completed).sum()
    }
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
