//! Load-generation harness for AkiDB-compatible vector services.
//!
//! Drives a target service through a timed insertion phase and a timed search
//! phase with a fixed pool of concurrent workers, then folds the per-worker
//! results into a [`TestReport`].

pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod profile;
pub mod progress;
pub mod ramp;
pub mod report;
pub mod rest;
pub mod service;
pub mod vectors;
pub mod worker;

pub use config::{format_duration, parse_duration, Backend, ConfigError, LoadTestConfig};
pub use error::{LoadError, LoadResult, ServiceError, ServiceResult};
pub use memory::{InMemoryConfig, InMemoryVectorService, InjectedFailure, ServiceOp};
pub use metrics::{throughput, CounterSnapshot, PhaseCounters, PhaseMetrics, WorkerOutcome};
pub use orchestrator::{LoadTestOrchestrator, RunConfig, RunStage};
pub use profile::{PressureLevel, PressureProfile, ProfileEntry, ProfileTable};
pub use progress::{ProgressReporter, ProgressSample};
pub use ramp::{RampSchedule, RampState};
pub use report::{ConfigEcho, ReportFormat, StageTimings, TestReport};
pub use rest::{RestConnector, RestVectorService};
pub use service::{
    CollectionSchema, Connector, IndexParams, SearchHit, SearchParams, VectorService,
};
pub use vectors::VectorGenerator;
pub use worker::{OperationKind, PhaseRunner, PhaseSpec, WorkerTask};
