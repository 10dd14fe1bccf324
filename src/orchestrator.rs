//! Orchestrator core: request lifecycle, scheduling passes, the assignment
//! queue, the progress state machine, reassignment and the worker registry.
//! A single mutex serializes every mutation of `requests`, `worker_status`
//! and `result_log`; the mutex is released before any durable
//! metadata-store call or the timed wait in `next_assignment`.

use crate::eligibility;
use crate::model::{
    Assignment, ModelError, RequestLifecycleState, SyncProgress, SyncRequest, SyncResult,
    WorkerEndpoint, WorkerHeartbeat, WorkerState, MASTER_DETAIL_KEY,
};
use crate::policy::{PolicyError, SchedulerPolicy, SchedulerRegistry};
use crate::store::{durably, MetadataStore};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    InvalidRequest(#[from] ModelError),
    #[error("request '{0}' already exists")]
    DuplicateRequest(String),
    #[error("request '{0}' not found")]
    RequestNotFound(String),
    #[error("request '{0}' is not in a reassignable state")]
    InvalidState(String),
    #[error("worker '{0}' is not registered")]
    WorkerNotRegistered(String),
    #[error("worker '{0}' cannot reach the source path of request '{1}'")]
    WorkerCannotReachSource(String, String),
    #[error("unknown scheduler policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Per-request master-internal bookkeeping.
struct RequestState {
    request: SyncRequest,
    progress: SyncProgress,
    pending_files: std::collections::VecDeque<String>,
    /// Endpoint key -> active assignment, kept in dispatch order so that
    /// `reassign_request` can restore paths to `pending_files` in the order
    /// they were originally handed out.
    active_assignments: Vec<(String, Assignment)>,
    preferred_worker: Option<String>,
}

impl RequestState {
    fn remove_active_assignment(&mut self, key: &str) {
        self.active_assignments.retain(|(k, _)| k != key);
    }
}

struct Inner {
    requests: HashMap<String, RequestState>,
    /// Insertion order of requests, so scheduling passes give older requests
    /// first claim on newly-available endpoints.
    order: Vec<String>,
    worker_status: HashMap<String, WorkerHeartbeat>,
    result_log: HashMap<String, Vec<SyncResult>>,
    scheduler: Box<dyn SchedulerPolicy>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Optional read-side staleness filter: a worker whose most recent
    /// heartbeat is older than this is treated as absent from scheduling,
    /// without mutating the registry.
    pub worker_heartbeat_timeout: Option<chrono::Duration>,
    /// Per-call timeout for `next_assignment` (default 1s).
    pub next_assignment_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_heartbeat_timeout: None,
            next_assignment_timeout: Duration::from_secs(1),
        }
    }
}

pub struct Orchestrator {
    inner: Mutex<Inner>,
    queue_tx: mpsc::UnboundedSender<Assignment>,
    queue_rx: Mutex<mpsc::UnboundedReceiver<Assignment>>,
    store: Arc<dyn MetadataStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        registry: &SchedulerRegistry,
        policy_name: &str,
        config: OrchestratorConfig,
    ) -> Result<Self, OrchestratorError> {
        let scheduler = registry.create(policy_name)?;
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Ok(Self {
            inner: Mutex::new(Inner {
                requests: HashMap::new(),
                order: Vec::new(),
                worker_status: HashMap::new(),
                result_log: HashMap::new(),
                scheduler,
            }),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            store,
            config,
        })
    }

    pub async fn submit_request(&self, request: SyncRequest) -> Result<(), OrchestratorError> {
        request.validate()?;
        let now = Utc::now();
        let progress;
        {
            let mut inner = self.inner.lock().await;
            if inner.requests.contains_key(&request.request_id) {
                return Err(OrchestratorError::DuplicateRequest(request.request_id.clone()));
            }
            let pending_files = request.initial_pending_files();
            progress = SyncProgress::new_queued(request.request_id.clone(), now);
            let request_id = request.request_id.clone();
            inner.requests.insert(
                request_id.clone(),
                RequestState {
                    request,
                    progress: progress.clone(),
                    pending_files,
                    active_assignments: Vec::new(),
                    preferred_worker: None,
                },
            );
            inner.order.push(request_id.clone());
            info!(request_id = %request_id, "request queued");
        }
        durably("store_request", || self.store.store_request(&progress)).await;
        self.schedule_work().await;
        Ok(())
    }

    pub async fn worker_heartbeat(&self, heartbeat: WorkerHeartbeat) -> Result<(), OrchestratorError> {
        heartbeat.validate()?;
        {
            let mut inner = self.inner.lock().await;
            inner
                .worker_status
                .insert(heartbeat.worker_id.clone(), heartbeat.clone());
        }
        durably("record_worker", || self.store.record_worker(&heartbeat)).await;
        self.schedule_work().await;
        Ok(())
    }

    /// One traversal of all requests attempting to emit new assignments
    /// under current worker state.
    async fn schedule_work(&self) {
        let now = Utc::now();
        let mut progress_writes: Vec<SyncProgress> = Vec::new();
        let mut result_writes: Vec<SyncResult> = Vec::new();

        {
            let mut inner = self.inner.lock().await;
            let order = inner.order.clone();
            let any_workers_registered = !inner.worker_status.is_empty();
            let heartbeats: Vec<WorkerHeartbeat> = inner.worker_status.values().cloned().collect();

            for request_id in order {
                // Phase 1: read-only eligibility check against a snapshot, so
                // no mutable borrow of `inner.requests` is held while we also
                // need to read `inner.requests` globally (the busy set) or
                // call into `inner.scheduler`.
                let plan = {
                    let Some(state) = inner.requests.get(&request_id) else {
                        continue;
                    };
                    if state.progress.state == RequestLifecycleState::Failed {
                        continue;
                    }
                    if state.pending_files.is_empty() {
                        continue;
                    }

                    let source_pool = eligibility::resolve(&state.request.source_path, &heartbeats);
                    if any_workers_registered && source_pool.is_empty() {
                        Plan::Fail(format!(
                            "No workers have access to source path {}",
                            state.request.source_path
                        ))
                    } else {
                        let destination_pool =
                            eligibility::resolve(&state.request.destination_path, &heartbeats);
                        if any_workers_registered && destination_pool.is_empty() {
                            Plan::Fail(format!(
                                "No workers have access to destination path {}",
                                state.request.destination_path
                            ))
                        } else if !any_workers_registered {
                            Plan::Wait
                        } else {
                            let mut candidate_workers: HashSet<String> =
                                source_pool.iter().cloned().collect();
                            if let Some(preferred) = &state.preferred_worker {
                                if !candidate_workers.contains(preferred) {
                                    Plan::Wait
                                } else {
                                    candidate_workers = [preferred.clone()].into_iter().collect();
                                    Plan::Assign {
                                        candidate_workers,
                                        source_pool,
                                        destination_pool,
                                        pending_count: state.pending_files.len(),
                                    }
                                }
                            } else {
                                Plan::Assign {
                                    candidate_workers,
                                    source_pool,
                                    destination_pool,
                                    pending_count: state.pending_files.len(),
                                }
                            }
                        }
                    }
                };

                match plan {
                    Plan::Wait => continue,
                    Plan::Fail(message) => {
                        let state = inner.requests.get_mut(&request_id).unwrap();
                        state.progress.state = RequestLifecycleState::Failed;
                        state
                            .progress
                            .detail
                            .insert(MASTER_DETAIL_KEY.to_string(), message.clone());
                        state.progress.updated_at = now;
                        state.pending_files.clear();
                        state.active_assignments.clear();
                        let synthetic = SyncResult {
                            request_id: request_id.clone(),
                            worker_id: "master".to_string(),
                            success: false,
                            message,
                            completed_at: now,
                            data_plane_address: None,
                        };
                        inner
                            .result_log
                            .entry(request_id.clone())
                            .or_default()
                            .push(synthetic.clone());
                        progress_writes.push(state.progress.clone());
                        result_writes.push(synthetic);
                    }
                    Plan::Assign {
                        candidate_workers,
                        source_pool,
                        destination_pool,
                        pending_count,
                    } => {
                        let busy: HashSet<String> = inner
                            .requests
                            .values()
                            .flat_map(|s| s.active_assignments.iter().map(|(k, _)| k.clone()))
                            .collect();

                        let mut available: Vec<WorkerEndpoint> = Vec::new();
                        for hb in &heartbeats {
                            if !candidate_workers.contains(&hb.worker_id) {
                                continue;
                            }
                            if hb.status == WorkerState::Error {
                                continue;
                            }
                            if let Some(timeout) = self.config.worker_heartbeat_timeout {
                                if now.signed_duration_since(hb.timestamp) > timeout {
                                    continue;
                                }
                            }
                            for ep in &hb.data_plane_endpoints {
                                let endpoint = WorkerEndpoint {
                                    worker_id: hb.worker_id.clone(),
                                    address: ep.address.clone(),
                                };
                                if busy.contains(&endpoint.key()) {
                                    continue;
                                }
                                available.push(endpoint);
                            }
                        }

                        let needed = available.len().min(pending_count);
                        if needed == 0 {
                            continue;
                        }

                        let chosen = inner.scheduler.select_workers(&available, needed);

                        let state = inner.requests.get_mut(&request_id).unwrap();
                        for endpoint in chosen {
                            let Some(source_path) = state.pending_files.pop_front() else {
                                break;
                            };
                            let assignment = Assignment {
                                request_id: request_id.clone(),
                                worker_id: endpoint.worker_id.clone(),
                                data_plane_address: endpoint.address.clone(),
                                source_path,
                                destination_path: state.request.destination_path.clone(),
                                chunk_offset: 0,
                                chunk_size: u64::from(state.request.chunk_size_mb) * 1024 * 1024,
                                source_worker_pool: source_pool.clone(),
                                destination_worker_pool: destination_pool.clone(),
                            };
                            let iface = iface_for(&heartbeats, &assignment.worker_id, &assignment.data_plane_address);
                            info!(
                                request_id = %assignment.request_id,
                                worker_id = %assignment.worker_id,
                                address = %assignment.data_plane_address,
                                iface = iface.unwrap_or("-"),
                                source_path = %assignment.source_path,
                                "assignment dispatched"
                            );
                            state
                                .active_assignments
                                .push((endpoint.key(), assignment.clone()));
                            let _ = self.queue_tx.send(assignment);
                        }
                    }
                }
            }
        }

        for progress in progress_writes {
            durably("update_progress", || self.store.update_progress(&progress)).await;
        }
        for result in result_writes {
            durably("append_result", || self.store.append_result(&result)).await;
        }
    }

    /// Waits for up to `timeout` on the assignment queue; a head-of-line
    /// mismatch (someone else's assignment reached this caller first) is
    /// requeued and reported as "none".
    pub async fn next_assignment(&self, worker_id: &str, timeout: Duration) -> Option<Assignment> {
        let assignment = {
            let mut rx = self.queue_rx.lock().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(assignment)) => assignment,
                _ => return None,
            }
        };
        if assignment.worker_id != worker_id {
            let _ = self.queue_tx.send(assignment);
            return None;
        }

        let progress_snapshot = {
            let mut inner = self.inner.lock().await;
            let Some(state) = inner.requests.get_mut(&assignment.request_id) else {
                return Some(assignment);
            };
            if state.progress.state == RequestLifecycleState::Queued {
                state.progress.state = RequestLifecycleState::Progress;
            }
            state
                .progress
                .detail
                .insert(assignment.endpoint_key(), "PROGRESS".to_string());
            state.progress.updated_at = Utc::now();
            state.progress.clone()
        };
        durably("update_progress", || self.store.update_progress(&progress_snapshot)).await;
        Some(assignment)
    }

    pub async fn report_result(&self, result: SyncResult) {
        let progress_snapshot;
        {
            let mut inner = self.inner.lock().await;
            let Some(state) = inner.requests.get_mut(&result.request_id) else {
                warn!(request_id = %result.request_id, "result reported for unknown request");
                return;
            };

            let detail_key = match &result.data_plane_address {
                Some(addr) => format!("{}::{}", result.worker_id, addr),
                None => state
                    .active_assignments
                    .iter()
                    .map(|(k, _)| k.clone())
                    .find(|k| k.starts_with(&format!("{}::", result.worker_id)))
                    .unwrap_or_else(|| result.worker_id.clone()),
            };

            state.progress.updated_at = Utc::now();
            if result.success {
                state.progress.detail.insert(detail_key.clone(), "COMPLETED".to_string());
            } else {
                state.progress.state = RequestLifecycleState::Failed;
                state.progress.detail.insert(detail_key.clone(), result.message.clone());
                warn!(
                    request_id = %result.request_id,
                    worker_id = %result.worker_id,
                    message = %result.message,
                    "assignment failed"
                );
            }
            state.remove_active_assignment(&detail_key);

            if state.pending_files.is_empty()
                && state.active_assignments.is_empty()
                && state.progress.state != RequestLifecycleState::Failed
            {
                state.progress.state = RequestLifecycleState::Completed;
                info!(request_id = %result.request_id, "request completed");
            }

            inner
                .result_log
                .entry(result.request_id.clone())
                .or_default()
                .push(result.clone());
            progress_snapshot = state.progress.clone();
        }

        durably("append_result", || self.store.append_result(&result)).await;
        durably("update_progress", || self.store.update_progress(&progress_snapshot)).await;
        self.schedule_work().await;
    }

    pub async fn reassign_request(
        &self,
        request_id: &str,
        worker_id: &str,
    ) -> Result<(), OrchestratorError> {
        let progress_snapshot;
        {
            let mut inner = self.inner.lock().await;

            {
                let state = inner
                    .requests
                    .get(request_id)
                    .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.to_string()))?;
                if !matches!(
                    state.progress.state,
                    RequestLifecycleState::Queued | RequestLifecycleState::Failed
                ) {
                    return Err(OrchestratorError::InvalidState(request_id.to_string()));
                }
            }

            if !inner.worker_status.contains_key(worker_id) {
                return Err(OrchestratorError::WorkerNotRegistered(worker_id.to_string()));
            }

            let heartbeats: Vec<WorkerHeartbeat> = inner.worker_status.values().cloned().collect();
            let source_path = inner.requests[request_id].request.source_path.clone();
            let pool = eligibility::resolve(&source_path, &heartbeats);
            if !pool.iter().any(|w| w == worker_id) {
                return Err(OrchestratorError::WorkerCannotReachSource(
                    worker_id.to_string(),
                    request_id.to_string(),
                ));
            }

            // Drain the assignment queue of entries belonging to this
            // request, preserving relative order of everything else.
            {
                let mut rx = self.queue_rx.lock().await;
                let mut drained = Vec::new();
                while let Ok(assignment) = rx.try_recv() {
                    drained.push(assignment);
                }
                for assignment in drained {
                    if assignment.request_id != request_id {
                        let _ = self.queue_tx.send(assignment);
                    }
                }
            }

            let state = inner.requests.get_mut(request_id).unwrap();
            let restored: Vec<String> = state
                .active_assignments
                .iter()
                .map(|(_, a)| a.source_path.clone())
                .collect();
            for path in restored.into_iter().rev() {
                state.pending_files.push_front(path);
            }
            state.active_assignments.clear();
            if state.pending_files.is_empty() {
                state.pending_files = state.request.initial_pending_files();
            }
            state.preferred_worker = Some(worker_id.to_string());
            state.progress.detail.retain(|key, value| {
                !(key == MASTER_DETAIL_KEY && value.starts_with("No workers have access"))
            });
            state.progress.state = RequestLifecycleState::Queued;
            state.progress.updated_at = Utc::now();
            progress_snapshot = state.progress.clone();
            info!(request_id = %request_id, worker_id = %worker_id, "request reassigned");
        }

        durably("update_progress", || self.store.update_progress(&progress_snapshot)).await;
        self.schedule_work().await;
        Ok(())
    }

    pub async fn query_progress(&self, request_id: &str) -> Option<SyncProgress> {
        let inner = self.inner.lock().await;
        inner.requests.get(request_id).map(|s| s.progress.clone())
    }

    pub async fn list_requests(&self) -> Vec<SyncProgress> {
        let inner = self.inner.lock().await;
        inner.order.iter().filter_map(|id| inner.requests.get(id)).map(|s| s.progress.clone()).collect()
    }

    pub async fn list_requests_for_worker(&self, worker_id: &str) -> Vec<SyncProgress> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.requests.get(id))
            .filter(|s| s.active_assignments.iter().any(|(_, a)| a.worker_id == worker_id))
            .map(|s| s.progress.clone())
            .collect()
    }

    /// Default long-poll duration for `next_assignment` when a caller does
    /// not specify one.
    pub fn default_poll_timeout(&self) -> Duration {
        self.config.next_assignment_timeout
    }

    pub async fn forget_request(&self, request_id: &str) {
        {
            let mut inner = self.inner.lock().await;
            inner.requests.remove(request_id);
            inner.order.retain(|id| id != request_id);
            inner.result_log.remove(request_id);
        }
        durably("delete_request", || self.store.delete_request(request_id)).await;
    }

}

/// Looks up the `iface` an endpoint was last heartbeated with, for log-line
/// disambiguation only; scheduling and endpoint-key identity never consult it.
fn iface_for<'a>(heartbeats: &'a [WorkerHeartbeat], worker_id: &str, address: &str) -> Option<&'a str> {
    heartbeats
        .iter()
        .find(|hb| hb.worker_id == worker_id)?
        .data_plane_endpoints
        .iter()
        .find(|ep| ep.address == address)?
        .iface
        .as_deref()
}

/// Outcome of the read-only eligibility phase of one request's scheduling
/// attempt, computed before any mutable borrow is taken.
enum Plan {
    Wait,
    Fail(String),
    Assign {
        candidate_workers: HashSet<String>,
        source_pool: Vec<String>,
        destination_pool: Vec<String>,
        pending_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;
    use crate::model::{DataPlaneEndpoint, RequestLifecycleState, WorkerState};
    use crate::policy::SchedulerRegistry;
    use crate::store::InMemoryMetadataStore;
    use std::sync::Arc;

    fn orchestrator() -> Orchestrator {
        let store = Arc::new(InMemoryMetadataStore::new());
        let registry = SchedulerRegistry::new();
        Orchestrator::new(store, &registry, "round_robin", OrchestratorConfig::default()).unwrap()
    }

    fn request(id: &str, files: Option<Vec<&str>>) -> SyncRequest {
        SyncRequest {
            request_id: id.to_string(),
            source_path: "/a/src".to_string(),
            destination_path: "/a/dst".to_string(),
            file_list: files.map(|fs| fs.into_iter().map(String::from).collect()),
            chunk_size_mb: 64,
        }
    }

    fn heartbeat(worker_id: &str, addresses: &[&str], storage_paths: &[&str]) -> WorkerHeartbeat {
        WorkerHeartbeat {
            worker_id: worker_id.to_string(),
            status: WorkerState::Idle,
            timestamp: Utc::now(),
            control_plane_address: "10.0.0.1".to_string(),
            data_plane_endpoints: addresses
                .iter()
                .map(|a| DataPlaneEndpoint {
                    address: a.to_string(),
                    iface: None,
                })
                .collect(),
            storage_paths: storage_paths.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    async fn happy_path_two_endpoints_one_worker() {
        let orch = orchestrator();
        orch.submit_request(request("r-1", Some(vec!["/a/src/f1", "/a/src/f2"])))
            .await
            .unwrap();
        orch.worker_heartbeat(heartbeat(
            "worker-1",
            &["192.168.1.10", "192.168.1.11"],
            &["/a"],
        ))
        .await
        .unwrap();

        let a1 = orch
            .next_assignment("worker-1", Duration::from_millis(200))
            .await
            .expect("first assignment");
        let a2 = orch
            .next_assignment("worker-1", Duration::from_millis(200))
            .await
            .expect("second assignment");
        assert_ne!(a1.data_plane_address, a2.data_plane_address);

        orch.report_result(SyncResult {
            request_id: "r-1".into(),
            worker_id: "worker-1".into(),
            success: true,
            message: String::new(),
            completed_at: Utc::now(),
            data_plane_address: Some(a1.data_plane_address.clone()),
        })
        .await;
        orch.report_result(SyncResult {
            request_id: "r-1".into(),
            worker_id: "worker-1".into(),
            success: true,
            message: String::new(),
            completed_at: Utc::now(),
            data_plane_address: Some(a2.data_plane_address.clone()),
        })
        .await;

        let progress = orch.query_progress("r-1").await.unwrap();
        assert_eq!(progress.state, RequestLifecycleState::Completed);
        assert_eq!(progress.detail.len(), 2);
        assert!(progress.detail.values().all(|v| v == "COMPLETED"));
    }

    #[test]
    async fn progress_transitions_on_pickup() {
        let orch = orchestrator();
        orch.submit_request(request("r-1", None)).await.unwrap();
        orch.worker_heartbeat(heartbeat("worker-1", &["192.168.1.10"], &["/a"]))
            .await
            .unwrap();
        let assignment = orch
            .next_assignment("worker-1", Duration::from_millis(200))
            .await
            .unwrap();

        let progress = orch.query_progress("r-1").await.unwrap();
        assert_eq!(progress.state, RequestLifecycleState::Progress);
        assert_eq!(
            progress.detail.get(&assignment.endpoint_key()).map(String::as_str),
            Some("PROGRESS")
        );
    }

    #[test]
    async fn failure_then_reassign_routes_to_new_worker() {
        let orch = orchestrator();
        orch.submit_request(request("r-1", None)).await.unwrap();
        orch.worker_heartbeat(heartbeat("w-a", &["10.0.0.1"], &["/a"]))
            .await
            .unwrap();
        orch.worker_heartbeat(heartbeat("w-b", &["10.0.0.2"], &["/a"]))
            .await
            .unwrap();

        let a1 = orch
            .next_assignment("w-a", Duration::from_millis(200))
            .await
            .expect("expected an assignment for w-a");
        assert_eq!(a1.worker_id, "w-a");

        orch.report_result(SyncResult {
            request_id: "r-1".into(),
            worker_id: "w-a".into(),
            success: false,
            message: "transfer failed".into(),
            completed_at: Utc::now(),
            data_plane_address: Some(a1.data_plane_address.clone()),
        })
        .await;
        assert_eq!(
            orch.query_progress("r-1").await.unwrap().state,
            RequestLifecycleState::Failed
        );

        orch.reassign_request("r-1", "w-b").await.unwrap();
        assert_eq!(
            orch.query_progress("r-1").await.unwrap().state,
            RequestLifecycleState::Queued
        );

        let assignment = orch
            .next_assignment("w-b", Duration::from_millis(200))
            .await
            .expect("w-b should now receive the work");
        assert_eq!(assignment.worker_id, "w-b");

        let none_for_a = orch.next_assignment("w-a", Duration::from_millis(100)).await;
        assert!(none_for_a.is_none());
    }

    #[test]
    async fn path_eligibility_gates_assignment_to_covering_worker() {
        let orch = orchestrator();
        orch.worker_heartbeat(heartbeat("src-worker", &["10.0.0.1"], &["/data/source"]))
            .await
            .unwrap();
        orch.worker_heartbeat(heartbeat(
            "dst-worker",
            &["10.0.0.2"],
            &["/data/destination"],
        ))
        .await
        .unwrap();

        let mut req = request("r-1", None);
        req.source_path = "/data/source/proj".to_string();
        req.destination_path = "/data/destination".to_string();
        orch.submit_request(req).await.unwrap();

        let assignment = orch
            .next_assignment("src-worker", Duration::from_millis(200))
            .await
            .expect("source-capable worker should be assigned");
        assert_eq!(assignment.source_worker_pool, vec!["src-worker".to_string()]);
        assert_eq!(
            assignment.destination_worker_pool,
            vec!["dst-worker".to_string()]
        );
    }

    #[test]
    async fn no_source_pool_fails_request_with_synthetic_result() {
        let orch = orchestrator();
        orch.worker_heartbeat(heartbeat("w-1", &["10.0.0.1"], &["/elsewhere"]))
            .await
            .unwrap();
        orch.submit_request(request("r-1", None)).await.unwrap();

        let progress = orch.query_progress("r-1").await.unwrap();
        assert_eq!(progress.state, RequestLifecycleState::Failed);
        let detail = progress.detail.get(MASTER_DETAIL_KEY).unwrap();
        assert!(detail.starts_with("No workers have access to source path"));
    }

    #[test]
    async fn duplicate_request_id_is_rejected() {
        let orch = orchestrator();
        orch.submit_request(request("r-1", None)).await.unwrap();
        let err = orch.submit_request(request("r-1", None)).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateRequest(_)));
    }

    #[test]
    async fn queued_request_waits_when_no_workers_registered() {
        let orch = orchestrator();
        orch.submit_request(request("r-1", None)).await.unwrap();
        let progress = orch.query_progress("r-1").await.unwrap();
        assert_eq!(progress.state, RequestLifecycleState::Queued);
    }
}
