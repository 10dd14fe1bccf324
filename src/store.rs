//! Durable metadata persistence contract and its reference implementations:
//! a Redis-backed store using the `dms:requests:<id>`, `dms:results:<id>`,
//! `dms:workers:<id>` key layout, and an in-memory store used by tests and
//! as the zero-config default.

use crate::model::{SyncProgress, SyncResult, WorkerHeartbeat};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("metadata store unreachable: {0}")]
    Unavailable(String),
    #[error("failed to (de)serialize metadata record: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Durable upsert/append contract the orchestrator writes through after
/// releasing its in-memory lock.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn store_request(&self, progress: &SyncProgress) -> Result<(), StoreError>;
    async fn update_progress(&self, progress: &SyncProgress) -> Result<(), StoreError>;
    async fn append_result(&self, result: &SyncResult) -> Result<(), StoreError>;
    async fn record_worker(&self, heartbeat: &WorkerHeartbeat) -> Result<(), StoreError>;
    async fn delete_request(&self, request_id: &str) -> Result<(), StoreError>;
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// TTL (in days) applied uniformly to every key written by [`RedisMetadataStore`].
#[derive(Debug, Clone, Copy)]
pub struct TtlDays(pub Option<u32>);

/// Reference [`MetadataStore`] backed by Redis, JSON-encoding every value
/// under a configurable namespace.
#[derive(Clone)]
pub struct RedisMetadataStore {
    client: redis::Client,
    namespace: String,
    ttl: TtlDays,
}

impl RedisMetadataStore {
    pub fn new(url: &str, namespace: impl Into<String>, ttl: TtlDays) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            namespace: namespace.into(),
            ttl,
        })
    }

    fn request_key(&self, request_id: &str) -> String {
        format!("{}:requests:{}", self.namespace, request_id)
    }

    fn result_key(&self, request_id: &str) -> String {
        format!("{}:results:{}", self.namespace, request_id)
    }

    fn worker_key(&self, worker_id: &str) -> String {
        format!("{}:workers:{}", self.namespace, worker_id)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.connection().await?;
        match self.ttl.0 {
            Some(days) if days > 0 => {
                let secs = u64::from(days) * 86_400;
                conn.set_ex::<_, _, ()>(key, payload, secs)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
            _ => {
                conn.set::<_, _, ()>(key, payload)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for RedisMetadataStore {
    async fn store_request(&self, progress: &SyncProgress) -> Result<(), StoreError> {
        self.set_json(&self.request_key(&progress.request_id), progress)
            .await
    }

    async fn update_progress(&self, progress: &SyncProgress) -> Result<(), StoreError> {
        self.set_json(&self.request_key(&progress.request_id), progress)
            .await
    }

    async fn append_result(&self, result: &SyncResult) -> Result<(), StoreError> {
        let payload = serde_json::to_string(result)?;
        let mut conn = self.connection().await?;
        let key = self.result_key(&result.request_id);
        conn.rpush::<_, _, ()>(&key, payload)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if let Some(days) = self.ttl.0.filter(|d| *d > 0) {
            let _: () = conn
                .expire(&key, i64::from(days) * 86_400)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }

    async fn record_worker(&self, heartbeat: &WorkerHeartbeat) -> Result<(), StoreError> {
        self.set_json(&self.worker_key(&heartbeat.worker_id), heartbeat)
            .await
    }

    async fn delete_request(&self, request_id: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(&[self.request_key(request_id), self.result_key(request_id)])
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// In-memory [`MetadataStore`] used by tests and as the zero-config default.
/// Writes never fail; this intentionally cannot exercise a "store
/// unreachable" path — tests that need that exercise a store double instead.
#[derive(Default, Clone)]
pub struct InMemoryMetadataStore {
    requests: Arc<Mutex<HashMap<String, SyncProgress>>>,
    results: Arc<Mutex<HashMap<String, Vec<SyncResult>>>>,
    workers: Arc<Mutex<HashMap<String, WorkerHeartbeat>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot_requests(&self) -> HashMap<String, SyncProgress> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn store_request(&self, progress: &SyncProgress) -> Result<(), StoreError> {
        debug!(request_id = %progress.request_id, "store_request");
        self.requests
            .lock()
            .await
            .insert(progress.request_id.clone(), progress.clone());
        Ok(())
    }

    async fn update_progress(&self, progress: &SyncProgress) -> Result<(), StoreError> {
        self.requests
            .lock()
            .await
            .insert(progress.request_id.clone(), progress.clone());
        Ok(())
    }

    async fn append_result(&self, result: &SyncResult) -> Result<(), StoreError> {
        self.results
            .lock()
            .await
            .entry(result.request_id.clone())
            .or_default()
            .push(result.clone());
        Ok(())
    }

    async fn record_worker(&self, heartbeat: &WorkerHeartbeat) -> Result<(), StoreError> {
        self.workers
            .lock()
            .await
            .insert(heartbeat.worker_id.clone(), heartbeat.clone());
        Ok(())
    }

    async fn delete_request(&self, request_id: &str) -> Result<(), StoreError> {
        self.requests.lock().await.remove(request_id);
        self.results.lock().await.remove(request_id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Logs and swallows a metadata-store failure without rolling back
/// in-memory state.
pub async fn durably<F, Fut>(operation: &'static str, f: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), StoreError>>,
{
    if let Err(err) = f().await {
        warn!(%operation, error = %err, "metadata store write failed; continuing with in-memory state");
    }
}
