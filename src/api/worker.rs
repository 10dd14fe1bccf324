use crate::api::{ApiTags, ErrorBody};
use crate::model::{Assignment, SyncProgress, SyncResult, WorkerHeartbeat};
use crate::orchestrator::{Orchestrator, OrchestratorError};
use poem_openapi::param::{Path, Query};
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use std::sync::Arc;
use std::time::Duration;

#[derive(ApiResponse, Debug)]
pub enum WorkerError {
    /// Invalid JSON or a schema/validation violation in the request body.
    #[oai(status = 422)]
    UnprocessableEntity(Json<ErrorBody>),
    /// The referenced worker or request is not known to the master.
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
}

impl From<OrchestratorError> for WorkerError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidRequest(_) => {
                WorkerError::UnprocessableEntity(Json(ErrorBody::new(err)))
            }
            OrchestratorError::RequestNotFound(_) | OrchestratorError::WorkerNotRegistered(_) => {
                WorkerError::NotFound(Json(ErrorBody::new(err)))
            }
            other => WorkerError::UnprocessableEntity(Json(ErrorBody::new(other))),
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct Ack {
    pub status: String,
}

pub struct WorkerApi {
    orchestrator: Arc<Orchestrator>,
}

#[OpenApi(prefix_path = "/workers", tag = ApiTags::Worker)]
impl WorkerApi {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Report a worker's current status, addresses and storage mounts.
    #[oai(path = "/heartbeat", method = "post", operation_id = "worker_heartbeat")]
    async fn heartbeat(&self, body: Json<WorkerHeartbeat>) -> Result<Json<Ack>, WorkerError> {
        self.orchestrator.worker_heartbeat(body.0).await?;
        Ok(Json(Ack {
            status: "ok".to_string(),
        }))
    }

    /// Long-poll for the next assignment dispatched to this worker; returns
    /// `null` if none arrives before `timeout_ms` elapses.
    #[oai(
        path = "/:worker_id/assignment",
        method = "post",
        operation_id = "next_worker_assignment"
    )]
    async fn next_assignment(
        &self,
        worker_id: Path<String>,
        timeout_ms: Query<Option<u64>>,
    ) -> Json<Option<Assignment>> {
        let timeout = timeout_ms
            .0
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.orchestrator.default_poll_timeout());
        Json(self.orchestrator.next_assignment(&worker_id.0, timeout).await)
    }

    /// Report the outcome of a single assignment.
    #[oai(path = "/result", method = "post", operation_id = "report_sync_result")]
    async fn report_result(&self, body: Json<SyncResult>) -> Json<Ack> {
        self.orchestrator.report_result(body.0).await;
        Json(Ack {
            status: "ack".to_string(),
        })
    }

    /// List the progress of every request currently assigned to this worker.
    #[oai(
        path = "/:worker_id/requests",
        method = "get",
        operation_id = "list_requests_for_worker"
    )]
    async fn list_requests_for_worker(&self, worker_id: Path<String>) -> Json<Vec<SyncProgress>> {
        Json(self.orchestrator.list_requests_for_worker(&worker_id.0).await)
    }
}
