//! Run orchestration
//!
//! A run walks a fixed sequence of stages:
//!
//! ```text
//! Connect → EnsureCleanCollection → CreateCollection → InsertPhase → Flush
//!   → CreateIndex → LoadCollection → SearchPhase → Cleanup → Report
//! ```
//!
//! Setup and teardown stages are fatal on failure. The two timed phases only
//! count operation failures and keep going.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{LoadError, LoadResult, ServiceResult};
use crate::metrics::PhaseMetrics;
use crate::profile::{PressureProfile, ProfileTable};
use crate::report::{StageTimings, TestReport};
use crate::service::{
    CollectionSchema, Connector, IndexParams, SearchParams, VectorService, DEFAULT_COLLECTION,
    DEFAULT_DIMENSION,
};
use crate::worker::{PhaseRunner, PhaseSpec};

/// Default progress log interval for real-time reporting.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Connect,
    EnsureCleanCollection,
    CreateCollection,
    InsertPhase,
    Flush,
    CreateIndex,
    LoadCollection,
    SearchPhase,
    Cleanup,
    Report,
}

impl RunStage {
    pub const ALL: [RunStage; 10] = [
        Self::Connect,
        Self::EnsureCleanCollection,
        Self::CreateCollection,
        Self::InsertPhase,
        Self::Flush,
        Self::CreateIndex,
        Self::LoadCollection,
        Self::SearchPhase,
        Self::Cleanup,
        Self::Report,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::EnsureCleanCollection => "ensure clean collection",
            Self::CreateCollection => "create collection",
            Self::InsertPhase => "insert phase",
            Self::Flush => "flush",
            Self::CreateIndex => "create index",
            Self::LoadCollection => "load collection",
            Self::SearchPhase => "search phase",
            Self::Cleanup => "cleanup",
            Self::Report => "report",
        }
    }

    /// True for stages whose failure aborts the run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::InsertPhase | Self::SearchPhase | Self::Report)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved parameters for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target address (`host:port` or URL).
    pub address: String,

    pub collection: String,
    pub dimension: usize,

    /// Insertion phase duration.
    pub duration: Duration,

    /// Search phase duration; `None` uses a quarter of `duration`.
    pub search_duration: Option<Duration>,

    pub profile: PressureProfile,
    pub ramp_up: bool,

    /// Log throughput while phases run.
    pub real_time: bool,
    pub progress_interval: Duration,

    pub seed: u64,
    pub top_k: usize,

    /// Query vectors per search request.
    pub queries_per_request: usize,

    pub index: IndexParams,
    pub search: SearchParams,

    /// Per-worker cap on operations per phase.
    pub stop_after_batches: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            address: "localhost:19530".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            dimension: DEFAULT_DIMENSION,
            duration: Duration::from_secs(30),
            search_duration: None,
            profile: ProfileTable::default().resolve(None),
            ramp_up: false,
            real_time: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            seed: 0,
            top_k: 3,
            queries_per_request: 1,
            index: IndexParams::default(),
            search: SearchParams::default(),
            stop_after_batches: None,
        }
    }
}

impl RunConfig {
    /// Search phase duration after applying the quarter-of-insert default.
    #[must_use]
    pub fn effective_search_duration(&self) -> Duration {
        self.search_duration.unwrap_or(self.duration / 4)
    }

    /// Rejects parameters no run could succeed with.
    pub fn validate(&self) -> LoadResult<()> {
        if self.address.trim().is_empty() {
            return Err(LoadError::InvalidConfig("address must not be empty".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(LoadError::InvalidConfig("collection must not be empty".to_string()));
        }
        if self.dimension == 0 {
            return Err(LoadError::InvalidConfig("dimension must be > 0".to_string()));
        }
        if self.duration.is_zero() {
            return Err(LoadError::InvalidConfig("duration must be > 0".to_string()));
        }
        if self.top_k == 0 {
            return Err(LoadError::InvalidConfig("top_k must be > 0".to_string()));
        }
        if self.profile.workers == 0 || self.profile.batch_size == 0 {
            return Err(LoadError::InvalidConfig(format!(
                "pressure level `{}` must have at least one worker and a non-empty batch",
                self.profile.level
            )));
        }
        Ok(())
    }

    fn phase_runner(&self) -> PhaseRunner {
        PhaseRunner {
            collection: self.collection.clone(),
            workers: self.profile.workers,
            batch_size: self.profile.batch_size,
            dimension: self.dimension,
            seed: self.seed,
            top_k: self.top_k,
            queries_per_request: self.queries_per_request,
            search_params: self.search.clone(),
            stop_after_batches: self.stop_after_batches,
            progress_interval: self.real_time.then_some(self.progress_interval),
        }
    }
}

/// Drives one run from connect to report.
pub struct LoadTestOrchestrator {
    config: RunConfig,
    completed: Vec<RunStage>,
}

impl LoadTestOrchestrator {
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            completed: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Stages that finished successfully during the last run, in order.
    #[must_use]
    pub fn completed_stages(&self) -> &[RunStage] {
        &self.completed
    }

    /// Runs every stage and returns the report.
    ///
    /// Returns `LoadError::Stage` as soon as a setup or teardown stage fails;
    /// no report is produced in that case.
    #[tracing::instrument(skip(self, connector), fields(address = %self.config.address, level = %self.config.profile.level))]
    pub async fn run(&mut self, connector: &dyn Connector) -> LoadResult<TestReport> {
        self.completed.clear();
        self.config.validate()?;

        let run_started = Instant::now();
        let mut timings = StageTimings::default();
        let collection = self.config.collection.clone();

        info!("🔌 Connecting to {}", self.config.address);
        let (service, elapsed) =
            timed(RunStage::Connect, connector.connect(&self.config.address)).await?;
        timings.connect = elapsed;
        self.complete(RunStage::Connect);
        info!("✅ Connected in {:?}", elapsed);

        let (_, elapsed) = timed(
            RunStage::EnsureCleanCollection,
            ensure_clean(service.as_ref(), &collection),
        )
        .await?;
        timings.ensure_clean = elapsed;
        self.complete(RunStage::EnsureCleanCollection);

        let schema = CollectionSchema::new(collection.clone(), self.config.dimension);
        let (_, elapsed) = timed(
            RunStage::CreateCollection,
            service.create_collection(&schema),
        )
        .await?;
        timings.create_collection = elapsed;
        self.complete(RunStage::CreateCollection);
        info!(
            "📦 Created collection '{}' (dimension {})",
            collection, self.config.dimension
        );

        let (insert, search) = match self.run_workload(&service, &schema, &mut timings).await {
            Ok(phases) => phases,
            Err(err) => {
                drop_after_failure(service.as_ref(), &collection).await;
                return Err(err);
            }
        };

        let (_, elapsed) = timed(RunStage::Cleanup, service.drop_collection(&collection)).await?;
        timings.cleanup = elapsed;
        self.complete(RunStage::Cleanup);
        info!("🧹 Dropped collection '{}'", collection);

        timings.total = run_started.elapsed();
        let report = TestReport::new(&self.config, timings, insert, search);
        self.complete(RunStage::Report);

        Ok(report)
    }

    async fn run_workload(
        &mut self,
        service: &Arc<dyn VectorService>,
        schema: &CollectionSchema,
        timings: &mut StageTimings,
    ) -> LoadResult<(PhaseMetrics, PhaseMetrics)> {
        let runner = self.config.phase_runner();
        let collection = schema.name.as_str();

        let insert = runner
            .run(
                Arc::clone(service),
                PhaseSpec::insert(self.config.duration, self.config.ramp_up),
            )
            .await?;
        self.complete(RunStage::InsertPhase);

        let (_, elapsed) = timed(RunStage::Flush, service.flush(collection)).await?;
        timings.flush = elapsed;
        self.complete(RunStage::Flush);
        info!("💾 Flushed in {:?}", elapsed);

        let (_, elapsed) = timed(
            RunStage::CreateIndex,
            service.create_index(collection, &schema.vector_field, &self.config.index),
        )
        .await?;
        timings.create_index = elapsed;
        self.complete(RunStage::CreateIndex);
        info!(
            "🔍 Built {} index (nlist {}) in {:?}",
            self.config.index.index_type, self.config.index.nlist, elapsed
        );

        let (_, elapsed) = timed(RunStage::LoadCollection, service.load_collection(collection)).await?;
        timings.load = elapsed;
        self.complete(RunStage::LoadCollection);
        info!("📥 Loaded collection in {:?}", elapsed);

        let search = runner
            .run(
                Arc::clone(service),
                PhaseSpec::search(self.config.effective_search_duration()),
            )
            .await?;
        self.complete(RunStage::SearchPhase);

        Ok((insert, search))
    }

    fn complete(&mut self, stage: RunStage) {
        debug_assert!(
            self.completed.last().map_or(true, |last| *last < stage),
            "stage {stage} completed out of order"
        );
        debug!(%stage, "Stage complete");
        self.completed.push(stage);
    }
}

async fn timed<T>(
    stage: RunStage,
    fut: impl Future<Output = ServiceResult<T>>,
) -> LoadResult<(T, Duration)> {
    let started = Instant::now();
    match fut.await {
        Ok(value) => Ok((value, started.elapsed())),
        Err(e) => {
            error!(%stage, "❌ Stage failed: {}", e);
            Err(LoadError::stage(stage, e))
        }
    }
}

async fn ensure_clean(service: &dyn VectorService, collection: &str) -> ServiceResult<()> {
    if service.has_collection(collection).await? {
        info!("Dropping existing collection '{}'", collection);
        service.drop_collection(collection).await?;
    }
    Ok(())
}

async fn drop_after_failure(service: &dyn VectorService, collection: &str) {
    match service.drop_collection(collection).await {
        Ok(()) => debug!(collection, "Dropped collection after failed run"),
        Err(e) => warn!(collection, "Could not drop collection after failed run: {}", e),
    }
}
