//! Wire and domain model types for the DMS master: requests, heartbeats,
//! assignments, results and progress records.

use chrono::{DateTime, Utc};
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

const DEFAULT_CHUNK_SIZE_MB: u32 = 64;
const MIN_CHUNK_SIZE_MB: u32 = 1;
const MAX_CHUNK_SIZE_MB: u32 = 1024;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("field '{field}' must be an absolute path, got '{value}'")]
    NotAbsolute { field: &'static str, value: String },
    #[error("field '{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

fn require_absolute(field: &'static str, value: &str) -> Result<(), ModelError> {
    if Path::new(value).is_absolute() {
        Ok(())
    } else {
        Err(ModelError::NotAbsolute {
            field,
            value: value.to_string(),
        })
    }
}

/// Client-supplied request to copy `source_path` to `destination_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SyncRequest {
    pub request_id: String,
    pub source_path: String,
    pub destination_path: String,
    #[oai(default)]
    pub file_list: Option<Vec<String>>,
    #[oai(default = "default_chunk_size_mb")]
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u32,
}

fn default_chunk_size_mb() -> u32 {
    DEFAULT_CHUNK_SIZE_MB
}

impl SyncRequest {
    pub fn validate(&self) -> Result<(), ModelError> {
        require_absolute("source_path", &self.source_path)?;
        require_absolute("destination_path", &self.destination_path)?;
        if let Some(files) = &self.file_list {
            for f in files {
                require_absolute("file_list[]", f)?;
            }
        }
        if !(MIN_CHUNK_SIZE_MB..=MAX_CHUNK_SIZE_MB).contains(&self.chunk_size_mb) {
            return Err(ModelError::OutOfRange {
                field: "chunk_size_mb",
                value: self.chunk_size_mb as i64,
                min: MIN_CHUNK_SIZE_MB as i64,
                max: MAX_CHUNK_SIZE_MB as i64,
            });
        }
        Ok(())
    }

    /// The initial FIFO of paths still needing an assignment.
    pub fn initial_pending_files(&self) -> VecDeque<String> {
        match &self.file_list {
            Some(files) if !files.is_empty() => files.iter().cloned().collect(),
            _ => VecDeque::from([self.source_path.clone()]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "UPPERCASE")]
#[oai(rename_all = "UPPERCASE")]
pub enum WorkerState {
    Idle,
    Transferring,
    Error,
}

/// One network address on which a worker will send/receive data-plane traffic.
///
/// `iface` is carried for operator-facing diagnostics only; scheduling and
/// endpoint-key identity are keyed on `address` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DataPlaneEndpoint {
    pub address: String,
    #[oai(default)]
    pub iface: Option<String>,
}

/// Periodic self-report from a worker agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkerHeartbeat {
    pub worker_id: String,
    pub status: WorkerState,
    pub timestamp: DateTime<Utc>,
    pub control_plane_address: String,
    #[oai(default)]
    pub data_plane_endpoints: Vec<DataPlaneEndpoint>,
    #[oai(default)]
    pub storage_paths: Vec<String>,
}

impl WorkerHeartbeat {
    pub fn validate(&self) -> Result<(), ModelError> {
        for path in &self.storage_paths {
            require_absolute("storage_paths[]", path)?;
        }
        Ok(())
    }
}

/// `(worker_id, address)`, globally unique identity of a data-plane endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerEndpoint {
    pub worker_id: String,
    pub address: String,
}

impl WorkerEndpoint {
    pub fn key(&self) -> String {
        format!("{}::{}", self.worker_id, self.address)
    }
}

/// A unit of transfer work dispatched to a specific worker endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Assignment {
    pub request_id: String,
    pub worker_id: String,
    pub data_plane_address: String,
    pub source_path: String,
    pub destination_path: String,
    pub chunk_offset: u64,
    pub chunk_size: u64,
    pub source_worker_pool: Vec<String>,
    pub destination_worker_pool: Vec<String>,
}

impl Assignment {
    pub fn endpoint_key(&self) -> String {
        format!("{}::{}", self.worker_id, self.data_plane_address)
    }
}

/// Worker-reported outcome of one assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SyncResult {
    pub request_id: String,
    pub worker_id: String,
    pub success: bool,
    #[oai(default)]
    pub message: String,
    pub completed_at: DateTime<Utc>,
    #[oai(default)]
    pub data_plane_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[serde(rename_all = "UPPERCASE")]
#[oai(rename_all = "UPPERCASE")]
pub enum RequestLifecycleState {
    Queued,
    Progress,
    Completed,
    Failed,
}

pub const MASTER_DETAIL_KEY: &str = "master";

/// Master-owned, durably-persisted progress record for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SyncProgress {
    pub request_id: String,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: RequestLifecycleState,
    #[oai(default)]
    pub detail: HashMap<String, String>,
}

impl SyncProgress {
    pub fn new_queued(request_id: String, now: DateTime<Utc>) -> Self {
        Self {
            request_id,
            transferred_bytes: 0,
            total_bytes: 0,
            started_at: now,
            updated_at: now,
            state: RequestLifecycleState::Queued,
            detail: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReassignRequest {
    pub worker_id: String,
}
