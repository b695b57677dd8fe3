//! In-process vector service for dry runs and tests
//!
//! Simulates the target engine closely enough to exercise every stage of a
//! run: collections must exist before inserts, must be indexed before they
//! can be loaded, and must be loaded before they can be searched. Searches
//! are brute-force L2 scans over the retained vectors.
//!
//! # Fault injection
//!
//! Any operation can be told to fail, either always, for its next `k` calls,
//! or on every `n`-th call:
//!
//! ```rust
//! use akidb_loadgen::memory::{InMemoryVectorService, InjectedFailure, ServiceOp};
//!
//! let service = InMemoryVectorService::new();
//! service.inject(ServiceOp::Insert, InjectedFailure::Next(3));
//! service.inject(ServiceOp::CreateIndex, InjectedFailure::Always);
//! ```

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::service::{
    CollectionSchema, Connector, IndexParams, SearchHit, SearchParams, VectorService,
};

/// Operations that can be targeted by fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    Connect,
    HasCollection,
    DropCollection,
    CreateCollection,
    Insert,
    Flush,
    CreateIndex,
    LoadCollection,
    Search,
}

impl ServiceOp {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::HasCollection => "has_collection",
            Self::DropCollection => "drop_collection",
            Self::CreateCollection => "create_collection",
            Self::Insert => "insert",
            Self::Flush => "flush",
            Self::CreateIndex => "create_index",
            Self::LoadCollection => "load_collection",
            Self::Search => "search",
        }
    }
}

/// Failure pattern for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Every call fails.
    Always,

    /// The next `k` calls fail, later calls succeed.
    Next(u64),

    /// Every `n`-th call fails (1-based; `EveryNth(3)` fails calls 3, 6, ...).
    EveryNth(u64),
}

#[derive(Debug)]
struct FaultState {
    pattern: InjectedFailure,
    calls: u64,
}

impl FaultState {
    fn should_fail(&mut self) -> bool {
        self.calls += 1;
        match &mut self.pattern {
            InjectedFailure::Always => true,
            InjectedFailure::Next(remaining) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            }
            InjectedFailure::EveryNth(n) => *n > 0 && self.calls % *n == 0,
        }
    }
}

/// Tuning for the simulated engine.
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Simulated per-call latency.
    pub latency: Duration,

    /// Vectors kept per collection for search. Inserts beyond the limit are
    /// counted but not stored.
    pub retain_limit: usize,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            retain_limit: 100_000,
        }
    }
}

#[derive(Debug)]
struct MemCollection {
    schema: CollectionSchema,
    vectors: Vec<Vec<f32>>,
    inserted: u64,
    flushed: u64,
    indexed: bool,
    loaded: bool,
}

/// In-memory implementation of [`VectorService`].
#[derive(Debug)]
pub struct InMemoryVectorService {
    config: InMemoryConfig,
    collections: RwLock<HashMap<String, MemCollection>>,
    faults: Mutex<HashMap<ServiceOp, FaultState>>,
    calls: Mutex<HashMap<ServiceOp, u64>>,
    total_inserted: AtomicU64,
}

impl Default for InMemoryVectorService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVectorService {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(InMemoryConfig::default())
    }

    #[must_use]
    pub fn with_config(config: InMemoryConfig) -> Self {
        Self {
            config,
            collections: RwLock::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total_inserted: AtomicU64::new(0),
        }
    }

    /// Installs a failure pattern for `op`, replacing any previous one.
    pub fn inject(&self, op: ServiceOp, pattern: InjectedFailure) {
        self.faults
            .lock()
            .insert(op, FaultState { pattern, calls: 0 });
    }

    /// Removes all injected failures.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Number of times `op` was invoked, failed calls included.
    #[must_use]
    pub fn call_count(&self, op: ServiceOp) -> u64 {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Vectors accepted across all collections since creation, including
    /// collections that were dropped since.
    #[must_use]
    pub fn total_inserted(&self) -> u64 {
        self.total_inserted.load(Ordering::Relaxed)
    }

    /// Vectors accepted by a live collection.
    #[must_use]
    pub fn collection_len(&self, name: &str) -> Option<u64> {
        self.collections.read().get(name).map(|c| c.inserted)
    }

    async fn before(&self, op: ServiceOp) -> ServiceResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        let fail = self
            .faults
            .lock()
            .get_mut(&op)
            .map(FaultState::should_fail)
            .unwrap_or(false);

        if fail {
            return Err(ServiceError::operation(op.as_str(), "injected failure"));
        }
        Ok(())
    }
}

/// "Connecting" hands out the shared instance. Fails only when a `Connect`
/// fault is injected.
#[async_trait]
impl Connector for Arc<InMemoryVectorService> {
    async fn connect(&self, address: &str) -> ServiceResult<Arc<dyn VectorService>> {
        self.before(ServiceOp::Connect)
            .await
            .map_err(|err| ServiceError::connection(address, err.to_string()))?;
        debug!(address, "Connected to in-memory vector service");
        Ok(Arc::clone(self) as Arc<dyn VectorService>)
    }
}

#[async_trait]
impl VectorService for InMemoryVectorService {
    async fn has_collection(&self, name: &str) -> ServiceResult<bool> {
        self.before(ServiceOp::HasCollection).await?;
        Ok(self.collections.read().contains_key(name))
    }

    async fn drop_collection(&self, name: &str) -> ServiceResult<()> {
        self.before(ServiceOp::DropCollection).await?;
        self.collections
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ServiceError::CollectionNotFound(name.to_string()))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> ServiceResult<()> {
        self.before(ServiceOp::CreateCollection).await?;

        if schema.dimension == 0 {
            return Err(ServiceError::InvalidRequest(
                "dimension must be > 0".to_string(),
            ));
        }

        let mut collections = self.collections.write();
        if collections.contains_key(&schema.name) {
            return Err(ServiceError::CollectionExists(schema.name.clone()));
        }

        collections.insert(
            schema.name.clone(),
            MemCollection {
                schema: schema.clone(),
                vectors: Vec::new(),
                inserted: 0,
                flushed: 0,
                indexed: false,
                loaded: false,
            },
        );
        Ok(())
    }

    async fn insert(&self, collection: &str, vectors: Vec<Vec<f32>>) -> ServiceResult<usize> {
        self.before(ServiceOp::Insert).await?;

        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| ServiceError::CollectionNotFound(collection.to_string()))?;

        let dimension = entry.schema.dimension;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(ServiceError::InvalidRequest(format!(
                "vector dimension {} does not match collection dimension {}",
                bad.len(),
                dimension
            )));
        }

        let count = vectors.len();
        let room = self.config.retain_limit.saturating_sub(entry.vectors.len());
        entry.vectors.extend(vectors.into_iter().take(room));
        entry.inserted += count as u64;
        self.total_inserted
            .fetch_add(count as u64, Ordering::Relaxed);

        Ok(count)
    }

    async fn flush(&self, collection: &str) -> ServiceResult<()> {
        self.before(ServiceOp::Flush).await?;

        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| ServiceError::CollectionNotFound(collection.to_string()))?;
        entry.flushed = entry.inserted;
        Ok(())
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> ServiceResult<()> {
        self.before(ServiceOp::CreateIndex).await?;

        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| ServiceError::CollectionNotFound(collection.to_string()))?;

        if field != entry.schema.vector_field {
            return Err(ServiceError::InvalidRequest(format!(
                "field `{}` is not a vector field of `{}`",
                field, collection
            )));
        }

        debug!(
            collection,
            index_type = %params.index_type,
            nlist = params.nlist,
            sealed = entry.flushed,
            "Index built"
        );
        entry.indexed = true;
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> ServiceResult<()> {
        self.before(ServiceOp::LoadCollection).await?;

        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| ServiceError::CollectionNotFound(collection.to_string()))?;

        if !entry.indexed {
            return Err(ServiceError::operation(
                "load_collection",
                format!("collection `{}` has no index", collection),
            ));
        }
        entry.loaded = true;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        queries: Vec<Vec<f32>>,
        top_k: usize,
        _params: &SearchParams,
    ) -> ServiceResult<Vec<Vec<SearchHit>>> {
        self.before(ServiceOp::Search).await?;

        let collections = self.collections.read();
        let entry = collections
            .get(collection)
            .ok_or_else(|| ServiceError::CollectionNotFound(collection.to_string()))?;

        if !entry.loaded {
            return Err(ServiceError::operation(
                "search",
                format!("collection `{}` is not loaded", collection),
            ));
        }

        let results = queries
            .iter()
            .map(|query| {
                let mut hits: Vec<SearchHit> = entry
                    .vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| SearchHit {
                        id: i.to_string(),
                        distance: l2_squared(query, v),
                    })
                    .collect();
                hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                hits.truncate(top_k);
                hits
            })
            .collect();

        Ok(results)
    }
}

fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready_service(dimension: usize) -> InMemoryVectorService {
        let service = InMemoryVectorService::new();
        service
            .create_collection(&CollectionSchema::new("c", dimension))
            .await
            .unwrap();
        service
    }

    #[tokio::test]
    async fn test_lifecycle_and_search() {
        let service = ready_service(2).await;

        let inserted = service
            .insert("c", vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![5.0, 5.0]])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        service.flush("c").await.unwrap();
        service
            .create_index("c", "embedding", &IndexParams::default())
            .await
            .unwrap();
        service.load_collection("c").await.unwrap();

        let results = service
            .search("c", vec![vec![0.9, 0.9]], 2, &SearchParams::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].len(), 2);
        assert_eq!(results[0][0].id, "1");
        assert_eq!(results[0][1].id, "0");
    }

    #[tokio::test]
    async fn test_search_requires_load() {
        let service = ready_service(2).await;

        let err = service
            .search("c", vec![vec![0.0, 0.0]], 3, &SearchParams::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not loaded"));

        let err = service.load_collection("c").await.unwrap_err();
        assert!(err.to_string().contains("no index"));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let service = ready_service(4).await;

        let err = service.insert("c", vec![vec![1.0; 3]]).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        assert_eq!(service.collection_len("c"), Some(0));
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_collections() {
        let service = ready_service(2).await;

        assert!(matches!(
            service.create_collection(&CollectionSchema::new("c", 2)).await,
            Err(ServiceError::CollectionExists(_))
        ));
        assert!(matches!(
            service.drop_collection("missing").await,
            Err(ServiceError::CollectionNotFound(_))
        ));
        assert!(service.has_collection("c").await.unwrap());
        service.drop_collection("c").await.unwrap();
        assert!(!service.has_collection("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_retain_limit_still_counts() {
        let service = InMemoryVectorService::with_config(InMemoryConfig {
            retain_limit: 2,
            ..Default::default()
        });
        service
            .create_collection(&CollectionSchema::new("c", 1))
            .await
            .unwrap();

        service
            .insert("c", vec![vec![1.0], vec![2.0], vec![3.0]])
            .await
            .unwrap();

        assert_eq!(service.collection_len("c"), Some(3));
        assert_eq!(service.total_inserted(), 3);
    }

    #[tokio::test]
    async fn test_injected_next_failures() {
        let service = ready_service(1).await;
        service.inject(ServiceOp::Insert, InjectedFailure::Next(2));

        assert!(service.insert("c", vec![vec![1.0]]).await.is_err());
        assert!(service.insert("c", vec![vec![1.0]]).await.is_err());
        assert!(service.insert("c", vec![vec![1.0]]).await.is_ok());
        assert_eq!(service.call_count(ServiceOp::Insert), 3);
        assert_eq!(service.total_inserted(), 1);
    }

    #[tokio::test]
    async fn test_injected_every_nth() {
        let service = ready_service(1).await;
        service.inject(ServiceOp::Insert, InjectedFailure::EveryNth(3));

        let mut failures = 0;
        for _ in 0..9 {
            if service.insert("c", vec![vec![0.5]]).await.is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 3);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let service = Arc::new(InMemoryVectorService::new());
        service.inject(ServiceOp::Connect, InjectedFailure::Always);

        let err = service
            .connect("mem://local")
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, ServiceError::Connection { .. }));

        service.clear_faults();
        assert!(service.connect("mem://local").await.is_ok());
    }
}
