use thiserror::Error;

use crate::orchestrator::RunStage;

/// Errors reported by a target vector service backend.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Could not reach or handshake with the target service.
    #[error("connection to `{address}` failed: {message}")]
    Connection {
        /// Address that was dialed.
        address: String,
        /// Human-readable failure detail.
        message: String,
    },

    /// Named collection does not exist on the target.
    #[error("collection `{0}` was not found")]
    CollectionNotFound(String),

    /// Named collection already exists on the target.
    #[error("collection `{0}` already exists")]
    CollectionExists(String),

    /// Request payload was rejected before reaching the engine.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Target answered with an error for an otherwise valid request.
    #[error("{operation} failed: {message}")]
    Operation {
        /// Operation name (e.g. `"insert"`).
        operation: &'static str,
        /// Error detail returned by the target.
        message: String,
    },

    /// Part of an insert batch was rejected after the rest was stored.
    #[error("insert stored {accepted} of {attempted} vectors: {source}")]
    PartialInsert {
        /// Vectors the target acknowledged.
        accepted: usize,
        /// Vectors in the batch.
        attempted: usize,
        /// First failure observed.
        #[source]
        source: Box<ServiceError>,
    },

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ServiceError {
    /// Creates a `Connection` variant.
    #[must_use]
    pub fn connection(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates an `Operation` variant.
    #[must_use]
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            message: message.into(),
        }
    }

    /// Items the target stored before this error; zero unless the batch was partial.
    #[must_use]
    pub fn accepted(&self) -> usize {
        match self {
            Self::PartialInsert { accepted, .. } => *accepted,
            _ => 0,
        }
    }
}

/// Result alias for backend calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that abort a load test run.
///
/// Operation failures inside a phase never surface here; they are counted by
/// the phase metrics instead.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A setup or teardown stage failed.
    #[error("{stage} failed: {source}")]
    Stage {
        /// Stage that was executing.
        stage: RunStage,
        /// Underlying backend error.
        #[source]
        source: ServiceError,
    },

    /// A worker task panicked or was cancelled before joining.
    #[error("worker {worker_id} in phase `{phase}` did not complete: {message}")]
    Worker {
        /// Phase the worker belonged to.
        phase: String,
        /// Worker index within the pool.
        worker_id: usize,
        /// Join error detail.
        message: String,
    },

    /// Run parameters were rejected before any stage started.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),
}

impl LoadError {
    /// Creates a `Stage` variant.
    #[must_use]
    pub fn stage(stage: RunStage, source: ServiceError) -> Self {
        Self::Stage { stage, source }
    }

    /// Returns the stage a fatal error was raised in, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<RunStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result alias for run-level operations.
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_message() {
        let err = LoadError::stage(
            RunStage::CreateIndex,
            ServiceError::operation("create_index", "segment not sealed"),
        );

        assert_eq!(err.failed_stage(), Some(RunStage::CreateIndex));
        assert_eq!(
            err.to_string(),
            "create index failed: create_index failed: segment not sealed"
        );
    }

    #[test]
    fn test_partial_insert_reports_accepted() {
        let err = ServiceError::PartialInsert {
            accepted: 1996,
            attempted: 2000,
            source: Box::new(ServiceError::operation("insert", "500 Internal Server Error")),
        };

        assert_eq!(err.accepted(), 1996);
        assert_eq!(
            err.to_string(),
            "insert stored 1996 of 2000 vectors: insert failed: 500 Internal Server Error"
        );
        assert_eq!(ServiceError::CollectionNotFound("c".into()).accepted(), 0);
    }

    #[test]
    fn test_non_stage_error_has_no_stage() {
        let err = LoadError::InvalidConfig("dimension must be > 0".to_string());
        assert!(err.failed_stage().is_none());
    }
}
