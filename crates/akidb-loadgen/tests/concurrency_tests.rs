//! Aggregation correctness under concurrent workers
//!
//! Workers race on the shared counters with randomized per-call delays; the
//! totals must still be exact.

use akidb_loadgen::{
    CollectionSchema, InMemoryVectorService, IndexParams, PhaseRunner, PhaseSpec, SearchHit,
    SearchParams, ServiceResult, VectorService,
};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delegates to the in-memory backend after a random delay.
struct JitteryService {
    inner: InMemoryVectorService,
    max_delay_us: u64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
}

impl JitteryService {
    fn new(max_delay_us: u64) -> Self {
        Self {
            inner: InMemoryVectorService::new(),
            max_delay_us,
            in_flight: AtomicU64::new(0),
            peak_in_flight: AtomicU64::new(0),
        }
    }

    async fn jitter(&self) {
        let delay = rand::thread_rng().gen_range(0..=self.max_delay_us);
        tokio::time::sleep(Duration::from_micros(delay)).await;
    }
}

#[async_trait]
impl VectorService for JitteryService {
    async fn has_collection(&self, name: &str) -> ServiceResult<bool> {
        self.inner.has_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> ServiceResult<()> {
        self.inner.drop_collection(name).await
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> ServiceResult<()> {
        self.inner.create_collection(schema).await
    }

    async fn insert(&self, collection: &str, vectors: Vec<Vec<f32>>) -> ServiceResult<usize> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.jitter().await;
        let result = self.inner.insert(collection, vectors).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn flush(&self, collection: &str) -> ServiceResult<()> {
        self.inner.flush(collection).await
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> ServiceResult<()> {
        self.inner.create_index(collection, field, params).await
    }

    async fn load_collection(&self, collection: &str) -> ServiceResult<()> {
        self.inner.load_collection(collection).await
    }

    async fn search(
        &self,
        collection: &str,
        queries: Vec<Vec<f32>>,
        top_k: usize,
        params: &SearchParams,
    ) -> ServiceResult<Vec<Vec<SearchHit>>> {
        self.jitter().await;
        self.inner.search(collection, queries, top_k, params).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_counts_exact_under_interleaving() {
    let (workers, per_worker, batch_size) = (16usize, 25u64, 37usize);

    let service = Arc::new(JitteryService::new(500));
    service
        .create_collection(&CollectionSchema::new("jitter", 4))
        .await
        .unwrap();

    let mut runner = PhaseRunner::new("jitter", workers, batch_size, 4);
    runner.stop_after_batches = Some(per_worker);

    let metrics = runner
        .run(service.clone(), PhaseSpec::insert(Duration::from_secs(60), false))
        .await
        .unwrap();

    let expected = workers as u64 * per_worker * batch_size as u64;
    assert_eq!(metrics.units, expected);
    assert_eq!(metrics.batches, workers as u64 * per_worker);
    assert_eq!(metrics.units_from_outcomes(), expected);
    assert_eq!(service.inner.total_inserted(), expected);

    assert_eq!(metrics.outcomes.len(), workers);
    for (id, outcome) in metrics.outcomes.iter().enumerate() {
        assert_eq!(outcome.worker_id, id);
        assert_eq!(outcome.batches_completed, per_worker);
    }

    // Workers really did overlap.
    assert!(service.peak_in_flight.load(Ordering::SeqCst) > 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_bounded_phase_totals_match_outcomes() {
    let service = Arc::new(JitteryService::new(2_000));
    service
        .create_collection(&CollectionSchema::new("deadline", 8))
        .await
        .unwrap();

    let runner = PhaseRunner::new("deadline", 8, 100, 8);
    let metrics = runner
        .run(service.clone(), PhaseSpec::insert(Duration::from_millis(300), false))
        .await
        .unwrap();

    let batches: u64 = metrics.outcomes.iter().map(|o| o.batches_completed).sum();
    assert!(batches > 0);
    assert_eq!(metrics.units, batches * 100);
    assert_eq!(metrics.units, service.inner.total_inserted());
    assert!(metrics.elapsed >= Duration::from_millis(300));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ramp_phase_counts_match_outcomes() {
    let service = Arc::new(JitteryService::new(1_000));
    service
        .create_collection(&CollectionSchema::new("ramp", 4))
        .await
        .unwrap();

    let runner = PhaseRunner::new("ramp", 10, 1_000, 4);
    let metrics = runner
        .run(service.clone(), PhaseSpec::insert(Duration::from_millis(400), true))
        .await
        .unwrap();

    assert_eq!(metrics.units_from_outcomes(), metrics.units);
    assert_eq!(metrics.units, service.inner.total_inserted());
    // Ramped batches never exceed the profile maximum.
    assert!(metrics.units <= metrics.batches * 1_000);
    assert!(metrics.units >= metrics.batches * 100);
    assert!(metrics.peak_ramp_workers >= 1 && metrics.peak_ramp_workers <= 10);
}
