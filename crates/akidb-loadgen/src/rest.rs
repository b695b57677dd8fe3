//! HTTP backend for an AkiDB REST server
//!
//! The server indexes vectors as they are written, so there is no separate
//! flush, index build or load step. Those calls become readiness checks on
//! the collection. Collections are addressed by id on the wire; names are
//! resolved through the list endpoint and cached.
//!
//! The server takes one document per request. A service-wide semaphore caps
//! the requests open at once across all workers.

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use parking_lot::RwLock;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::service::{
    CollectionSchema, Connector, IndexParams, SearchHit, SearchParams, VectorService,
};

/// Default cap on concurrent HTTP requests per service.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    dimension: u32,
    metric: &'a str,
}

#[derive(Deserialize)]
struct CreateCollectionResponse {
    collection_id: String,
}

#[derive(Deserialize)]
struct ListCollectionsResponse {
    collections: Vec<CollectionInfo>,
}

#[derive(Deserialize)]
struct GetCollectionResponse {
    collection: CollectionInfo,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    collection_id: String,
    name: String,
    dimension: u32,
}

#[derive(Serialize)]
struct InsertRequest {
    doc_id: String,
    vector: Vec<f32>,
}

#[derive(Serialize)]
struct QueryRequest {
    query_vector: Vec<f32>,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<MatchResult>,
}

#[derive(Deserialize)]
struct MatchResult {
    doc_id: String,
    distance: f32,
}

/// REST client implementing [`VectorService`].
pub struct RestVectorService {
    client: reqwest::Client,
    base_url: String,
    max_in_flight: usize,
    limiter: Semaphore,
    collection_ids: RwLock<HashMap<String, String>>,
}

impl RestVectorService {
    /// Builds a client without contacting the server.
    pub fn new(address: &str, timeout: Duration) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ServiceError::connection(address, e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url(address),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            limiter: Semaphore::new(DEFAULT_MAX_IN_FLIGHT),
            collection_ids: RwLock::new(HashMap::new()),
        })
    }

    /// Caps concurrent requests at `limit` (at least 1).
    #[must_use]
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        let limit = limit.max(1);
        self.max_in_flight = limit;
        self.limiter = Semaphore::new(limit);
        self
    }

    /// Checks `GET /health` and hands the client out for sharing.
    pub async fn connect(self) -> ServiceResult<Arc<Self>> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::connection(&self.base_url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::connection(
                &self.base_url,
                format!("health check returned {}", response.status()),
            ));
        }

        info!(
            base_url = %self.base_url,
            max_in_flight = self.max_in_flight,
            "Connected to AkiDB REST API"
        );
        Ok(Arc::new(self))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    async fn permit(&self, operation: &'static str) -> ServiceResult<SemaphorePermit<'_>> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| ServiceError::operation(operation, "request limiter closed"))
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }

    async fn list(&self) -> ServiceResult<Vec<CollectionInfo>> {
        let response = self.client.get(self.collections_url()).send().await?;
        let body: ListCollectionsResponse = expect_success(response, "list_collections")
            .await?
            .json()
            .await?;

        let mut ids = self.collection_ids.write();
        ids.clear();
        for info in &body.collections {
            ids.insert(info.name.clone(), info.collection_id.clone());
        }
        Ok(body.collections)
    }

    async fn resolve(&self, name: &str) -> ServiceResult<String> {
        let cached = self.collection_ids.read().get(name).cloned();
        if let Some(id) = cached {
            return Ok(id);
        }

        self.list()
            .await?
            .into_iter()
            .find(|info| info.name == name)
            .map(|info| info.collection_id)
            .ok_or_else(|| ServiceError::CollectionNotFound(name.to_string()))
    }

    async fn ensure_ready(&self, name: &str, operation: &'static str) -> ServiceResult<()> {
        let id = self.resolve(name).await?;
        let response = self
            .client
            .get(format!("{}/{}", self.collections_url(), id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            self.collection_ids.write().remove(name);
            return Err(ServiceError::CollectionNotFound(name.to_string()));
        }

        let body: GetCollectionResponse = expect_success(response, operation).await?.json().await?;
        debug!(
            collection = %body.collection.name,
            dimension = body.collection.dimension,
            operation,
            "Collection ready"
        );
        Ok(())
    }

    async fn insert_one(&self, url: &str, vector: Vec<f32>) -> ServiceResult<()> {
        let request = InsertRequest {
            doc_id: Uuid::new_v4().to_string(),
            vector,
        };
        let _permit = self.permit("insert").await?;
        let response = self.client.post(url).json(&request).send().await?;
        expect_success(response, "insert").await?;
        Ok(())
    }

    async fn query_one(&self, url: &str, query: Vec<f32>, top_k: usize) -> ServiceResult<Vec<SearchHit>> {
        let request = QueryRequest {
            query_vector: query,
            top_k,
        };
        let _permit = self.permit("search").await?;
        let response = self.client.post(url).json(&request).send().await?;
        let body: QueryResponse = expect_success(response, "search").await?.json().await?;

        Ok(body
            .matches
            .into_iter()
            .map(|m| SearchHit {
                id: m.doc_id,
                distance: m.distance,
            })
            .collect())
    }
}

#[async_trait]
impl VectorService for RestVectorService {
    async fn has_collection(&self, name: &str) -> ServiceResult<bool> {
        Ok(self.list().await?.iter().any(|info| info.name == name))
    }

    async fn drop_collection(&self, name: &str) -> ServiceResult<()> {
        let id = self.resolve(name).await?;
        let response = self
            .client
            .delete(format!("{}/{}", self.collections_url(), id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            self.collection_ids.write().remove(name);
            return Err(ServiceError::CollectionNotFound(name.to_string()));
        }
        expect_success(response, "drop_collection").await?;

        self.collection_ids.write().remove(name);
        Ok(())
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> ServiceResult<()> {
        let dimension = u32::try_from(schema.dimension).map_err(|_| {
            ServiceError::InvalidRequest(format!("dimension {} is too large", schema.dimension))
        })?;
        let request = CreateCollectionRequest {
            name: &schema.name,
            dimension,
            metric: &schema.metric,
        };

        let response = self
            .client
            .post(self.collections_url())
            .json(&request)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(ServiceError::CollectionExists(schema.name.clone()));
        }
        let body: CreateCollectionResponse = expect_success(response, "create_collection")
            .await?
            .json()
            .await?;

        self.collection_ids
            .write()
            .insert(schema.name.clone(), body.collection_id);
        Ok(())
    }

    async fn insert(&self, collection: &str, vectors: Vec<Vec<f32>>) -> ServiceResult<usize> {
        let id = self.resolve(collection).await?;
        let url = format!("{}/{}/insert", self.collections_url(), id);
        let attempted = vectors.len();

        let mut results = stream::iter(vectors)
            .map(|vector| self.insert_one(&url, vector))
            .buffer_unordered(self.max_in_flight);

        let mut accepted = 0;
        let mut first_error = None;
        while let Some(result) = results.next().await {
            match result {
                Ok(()) => accepted += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(accepted),
            Some(e) if accepted == 0 => Err(e),
            Some(e) => {
                debug!(collection, accepted, attempted, "Insert batch partially stored");
                Err(ServiceError::PartialInsert {
                    accepted,
                    attempted,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn flush(&self, collection: &str) -> ServiceResult<()> {
        self.ensure_ready(collection, "flush").await
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> ServiceResult<()> {
        debug!(
            collection,
            field,
            index_type = %params.index_type,
            "Server indexes on write; checking readiness only"
        );
        self.ensure_ready(collection, "create_index").await
    }

    async fn load_collection(&self, collection: &str) -> ServiceResult<()> {
        self.ensure_ready(collection, "load_collection").await
    }

    async fn search(
        &self,
        collection: &str,
        queries: Vec<Vec<f32>>,
        top_k: usize,
        _params: &SearchParams,
    ) -> ServiceResult<Vec<Vec<SearchHit>>> {
        let id = self.resolve(collection).await?;
        let url = format!("{}/{}/query", self.collections_url(), id);

        stream::iter(queries)
            .map(|query| self.query_one(&url, query, top_k))
            .buffered(self.max_in_flight)
            .try_collect()
            .await
    }
}

/// Connects to AkiDB REST servers.
#[derive(Debug, Clone, Copy)]
pub struct RestConnector {
    pub timeout: Duration,
    pub max_in_flight: usize,
}

impl Default for RestConnector {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[async_trait]
impl Connector for RestConnector {
    async fn connect(&self, address: &str) -> ServiceResult<Arc<dyn VectorService>> {
        let service = RestVectorService::new(address, self.timeout)?
            .with_max_in_flight(self.max_in_flight)
            .connect()
            .await?;
        Ok(service as Arc<dyn VectorService>)
    }
}

/// `host:port` becomes `http://host:port`; explicit schemes are kept.
fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

async fn expect_success(response: Response, operation: &'static str) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST {
        return Err(ServiceError::InvalidRequest(format!("{operation}: {body}")));
    }
    Err(ServiceError::operation(operation, format!("{status}: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("localhost:19530"), "http://localhost:19530");
        assert_eq!(base_url("http://127.0.0.1:8080/"), "http://127.0.0.1:8080");
        assert_eq!(base_url(" https://akidb.example.com "), "https://akidb.example.com");
    }

    #[test]
    fn test_new_does_not_connect() {
        let service = RestVectorService::new("10.255.255.1:9", Duration::from_secs(1)).unwrap();
        assert_eq!(service.base_url(), "http://10.255.255.1:9");
        assert_eq!(service.max_in_flight(), DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(service.with_max_in_flight(0).max_in_flight(), 1);
        let service = RestVectorService::new("10.255.255.1:9", Duration::from_secs(1)).unwrap();
        assert_eq!(
            service.collections_url(),
            "http://10.255.255.1:9/api/v1/collections"
        );
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let connector = RestConnector {
            timeout: Duration::from_secs(2),
            ..Default::default()
        };

        let err = connector
            .connect("127.0.0.1:1")
            .await
            .err()
            .expect("nothing listens on port 1");

        assert!(matches!(err, ServiceError::Connection { .. }));
    }
}
