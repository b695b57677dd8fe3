use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceResult;

/// Default collection used by load test runs.
pub const DEFAULT_COLLECTION: &str = "akidb_load_test";

/// Default primary key field name.
pub const PRIMARY_KEY_FIELD: &str = "id";

/// Default vector field name.
pub const VECTOR_FIELD: &str = "embedding";

/// Default vector dimension.
pub const DEFAULT_DIMENSION: usize = 8;

/// Schema of the collection created for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,

    /// Auto-generated int64 primary key field.
    pub primary_key_field: String,

    /// Float vector field.
    pub vector_field: String,

    /// Vector dimension.
    pub dimension: usize,

    /// Distance metric name (`"l2"`, `"cosine"`, `"dot"`).
    pub metric: String,
}

impl CollectionSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            primary_key_field: PRIMARY_KEY_FIELD.to_string(),
            vector_field: VECTOR_FIELD.to_string(),
            dimension,
            metric: "l2".to_string(),
        }
    }
}

/// Index build parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Index kind, e.g. `"IVF_FLAT"`.
    pub index_type: String,

    /// Distance metric name.
    pub metric: String,

    /// Number of IVF clusters.
    pub nlist: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            index_type: "IVF_FLAT".to_string(),
            metric: "l2".to_string(),
            nlist: 16,
        }
    }
}

/// Search-time parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Number of IVF clusters probed per query.
    pub nprobe: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { nprobe: 10 }
    }
}

/// One nearest-neighbour match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier assigned by the target.
    pub id: String,

    /// Distance to the query (metric-dependent).
    pub distance: f32,
}

/// Capability surface the harness needs from a target vector service.
///
/// Implementations must be safe to call concurrently from every worker of a
/// phase; the orchestrator shares a single instance behind an `Arc`.
#[async_trait]
pub trait VectorService: Send + Sync {
    /// Returns true when a collection with this name exists.
    async fn has_collection(&self, name: &str) -> ServiceResult<bool>;

    /// Drops a collection and all of its data.
    async fn drop_collection(&self, name: &str) -> ServiceResult<()>;

    /// Creates a collection with the given schema.
    async fn create_collection(&self, schema: &CollectionSchema) -> ServiceResult<()>;

    /// Inserts a batch of fixed-dimension vectors and returns how many were
    /// accepted. A batch that is only partly stored fails with
    /// [`ServiceError::PartialInsert`](crate::error::ServiceError::PartialInsert).
    async fn insert(&self, collection: &str, vectors: Vec<Vec<f32>>) -> ServiceResult<usize>;

    /// Seals pending writes so they become visible to index builds.
    async fn flush(&self, collection: &str) -> ServiceResult<()>;

    /// Builds an index on `field`. May block until the build completes.
    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> ServiceResult<()>;

    /// Loads a collection into memory so it can be searched.
    async fn load_collection(&self, collection: &str) -> ServiceResult<()>;

    /// Runs one search request with one or more query vectors and returns
    /// the hits for each query.
    async fn search(
        &self,
        collection: &str,
        queries: Vec<Vec<f32>>,
        top_k: usize,
        params: &SearchParams,
    ) -> ServiceResult<Vec<Vec<SearchHit>>>;
}

/// Opens a session against a target address.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> ServiceResult<Arc<dyn VectorService>>;
}
