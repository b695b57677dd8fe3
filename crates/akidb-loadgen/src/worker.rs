//! Fixed-size worker pool for one timed phase
//!
//! Each worker runs a tight loop until the phase deadline: check the clock,
//! produce a batch, call the service, record the outcome. The deadline is
//! only checked between operations, so a phase can overrun by at most one
//! in-flight operation per worker.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{LoadError, LoadResult, ServiceResult};
use crate::metrics::{PhaseCounters, PhaseMetrics, WorkerOutcome};
use crate::progress::ProgressReporter;
use crate::ramp::RampSchedule;
use crate::service::{SearchParams, VectorService};
use crate::vectors::VectorGenerator;

/// Kind of operation a phase issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Search,
}

impl OperationKind {
    // Keeps insert and search vectors on separate streams for the same run seed.
    fn seed_salt(self) -> u64 {
        match self {
            Self::Insert => 0,
            Self::Search => 0x5EA2_C4ED_0000_0001,
        }
    }
}

/// One timed phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSpec {
    /// Phase name used in logs and metrics.
    pub name: String,

    /// How long workers keep starting new operations.
    pub duration: Duration,

    /// Whether batch size follows the linear ramp.
    pub ramp_up: bool,

    pub operation: OperationKind,
}

impl PhaseSpec {
    #[must_use]
    pub fn insert(duration: Duration, ramp_up: bool) -> Self {
        Self {
            name: "insert".to_string(),
            duration,
            ramp_up,
            operation: OperationKind::Insert,
        }
    }

    #[must_use]
    pub fn search(duration: Duration) -> Self {
        Self {
            name: "search".to_string(),
            duration,
            ramp_up: false,
            operation: OperationKind::Search,
        }
    }
}

/// State shared by every worker of a running phase.
struct ActivePhase {
    spec: PhaseSpec,
    service: Arc<dyn VectorService>,
    collection: String,
    started: Instant,
    deadline: Instant,
    ramp: Option<RampSchedule>,
    workers: usize,
    batch_size: usize,
    top_k: usize,
    queries_per_request: usize,
    search_params: SearchParams,
    stop_after_batches: Option<u64>,
}

impl ActivePhase {
    fn current_load(&self) -> (usize, usize) {
        match &self.ramp {
            Some(ramp) => {
                let state = ramp.at(self.started.elapsed());
                (state.batch_size, state.workers)
            }
            None => (self.batch_size, self.workers),
        }
    }
}

/// One worker of a phase.
pub struct WorkerTask {
    pub worker_id: usize,
    phase: Arc<ActivePhase>,
    rng: VectorGenerator,
    counters: Arc<PhaseCounters>,
}

impl WorkerTask {
    async fn run(mut self) -> WorkerOutcome {
        let mut outcome = WorkerOutcome {
            worker_id: self.worker_id,
            ..Default::default()
        };
        let mut iteration: u64 = 0;

        debug!(
            phase = %self.phase.spec.name,
            worker_id = self.worker_id,
            "Worker started"
        );

        while Instant::now() < self.phase.deadline {
            if let Some(limit) = self.phase.stop_after_batches {
                if iteration >= limit {
                    break;
                }
            }

            let result = match self.phase.spec.operation {
                OperationKind::Insert => self.insert_once().await,
                OperationKind::Search => self.search_once().await,
            };

            match result {
                Ok(units) => {
                    self.counters.record_success(units);
                    outcome.batches_completed += 1;
                    outcome.units_completed += units;
                }
                Err(e) => {
                    let salvaged = e.accepted() as u64;
                    warn!(
                        phase = %self.phase.spec.name,
                        worker_id = self.worker_id,
                        iteration,
                        salvaged,
                        "Operation failed: {}",
                        e
                    );
                    if salvaged > 0 {
                        self.counters.record_partial(salvaged);
                        outcome.units_completed += salvaged;
                    } else {
                        self.counters.record_failure();
                    }
                    outcome.errors += 1;
                }
            }

            iteration += 1;
            tokio::task::yield_now().await;
        }

        debug!(
            phase = %self.phase.spec.name,
            worker_id = self.worker_id,
            batches = outcome.batches_completed,
            errors = outcome.errors,
            "Worker finished"
        );
        outcome
    }

    async fn insert_once(&mut self) -> ServiceResult<u64> {
        let (batch_size, workers) = self.phase.current_load();
        self.counters.observe_load(batch_size, workers);

        let vectors = self.rng.batch(batch_size);
        let accepted = self
            .phase
            .service
            .insert(&self.phase.collection, vectors)
            .await?;
        Ok(accepted as u64)
    }

    async fn search_once(&mut self) -> ServiceResult<u64> {
        let (_, workers) = self.phase.current_load();
        self.counters
            .observe_load(self.phase.queries_per_request, workers);

        let queries = self.rng.batch(self.phase.queries_per_request);
        self.phase
            .service
            .search(
                &self.phase.collection,
                queries,
                self.phase.top_k,
                &self.phase.search_params,
            )
            .await?;
        Ok(1)
    }
}

/// Runs phases against one collection with a fixed pool size.
#[derive(Debug, Clone)]
pub struct PhaseRunner {
    pub collection: String,
    pub workers: usize,
    pub batch_size: usize,
    pub dimension: usize,
    pub seed: u64,
    pub top_k: usize,
    pub queries_per_request: usize,
    pub search_params: SearchParams,

    /// Per-worker cap on operations; `None` runs until the deadline.
    pub stop_after_batches: Option<u64>,

    /// Progress log interval; `None` disables real-time reporting.
    pub progress_interval: Option<Duration>,
}

impl PhaseRunner {
    #[must_use]
    pub fn new(
        collection: impl Into<String>,
        workers: usize,
        batch_size: usize,
        dimension: usize,
    ) -> Self {
        Self {
            collection: collection.into(),
            workers,
            batch_size,
            dimension,
            seed: 0,
            top_k: 3,
            queries_per_request: 1,
            search_params: SearchParams::default(),
            stop_after_batches: None,
            progress_interval: None,
        }
    }

    /// Spawns the pool, waits for every worker and folds their outcomes.
    ///
    /// Operation failures are counted, never returned. Only a worker that
    /// panics or is cancelled turns into an error.
    #[tracing::instrument(skip(self, service, spec), fields(phase = %spec.name, workers = self.workers))]
    pub async fn run(
        &self,
        service: Arc<dyn VectorService>,
        spec: PhaseSpec,
    ) -> LoadResult<PhaseMetrics> {
        let workers = self.workers.max(1);
        let batch_size = self.batch_size.max(1);
        let started = Instant::now();
        let counters = Arc::new(PhaseCounters::new());

        let ramp = spec
            .ramp_up
            .then(|| RampSchedule::new(spec.duration, workers, batch_size));
        match &ramp {
            Some(ramp) => {
                let start = ramp.start();
                info!(
                    "🚀 Starting {} phase with ramp-up: {} → {} batch size over {:?}",
                    spec.name, start.batch_size, batch_size, spec.duration
                );
            }
            None => info!(
                "🚀 Starting {} phase: {} workers, {:?}",
                spec.name, workers, spec.duration
            ),
        }

        let phase_name = spec.name.clone();
        let phase_seed = self.seed ^ spec.operation.seed_salt();
        let phase = Arc::new(ActivePhase {
            deadline: started + spec.duration,
            spec,
            service,
            collection: self.collection.clone(),
            started,
            ramp,
            workers,
            batch_size,
            top_k: self.top_k.max(1),
            queries_per_request: self.queries_per_request.max(1),
            search_params: self.search_params.clone(),
            stop_after_batches: self.stop_after_batches,
        });

        let reporter = self.progress_interval.map(|interval| {
            ProgressReporter::spawn(phase_name.clone(), Arc::clone(&counters), interval, started)
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let task = WorkerTask {
                    worker_id,
                    phase: Arc::clone(&phase),
                    rng: VectorGenerator::for_worker(phase_seed, worker_id, self.dimension),
                    counters: Arc::clone(&counters),
                };
                tokio::spawn(task.run())
            })
            .collect();

        let mut outcomes = Vec::with_capacity(workers);
        let mut join_error = None;
        for (worker_id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    if join_error.is_none() {
                        join_error = Some(LoadError::Worker {
                            phase: phase_name.clone(),
                            worker_id,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        let elapsed = started.elapsed();

        if let Some(reporter) = reporter {
            reporter.stop().await;
        }
        if let Some(err) = join_error {
            return Err(err);
        }

        let snapshot = counters.snapshot();
        let metrics = PhaseMetrics {
            phase: phase_name,
            units: snapshot.units,
            batches: snapshot.batches,
            errors: snapshot.errors,
            elapsed,
            workers,
            peak_ramp_workers: snapshot.peak_workers,
            outcomes,
        };

        info!(
            "✅ {} phase complete: {} units in {:.2}s ({:.1}/sec, {} errors)",
            metrics.phase,
            metrics.units,
            metrics.elapsed.as_secs_f64(),
            metrics.throughput(),
            metrics.errors
        );
        Ok(metrics)
    }
}
