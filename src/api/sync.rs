use crate::api::{ApiTags, ErrorBody};
use crate::model::{ReassignRequest, SyncProgress, SyncRequest};
use crate::orchestrator::{Orchestrator, OrchestratorError};
use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use std::sync::Arc;
use tracing::Instrument;

#[derive(ApiResponse, Debug)]
pub enum SyncError {
    /// Invalid JSON or a schema/validation violation (non-absolute path, out-of-range chunk size, ...).
    #[oai(status = 422)]
    UnprocessableEntity(Json<ErrorBody>),
    /// No request with this id is known to the master.
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// A request with this id already exists.
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
}

impl From<OrchestratorError> for SyncError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidRequest(_) => {
                SyncError::UnprocessableEntity(Json(ErrorBody::new(err)))
            }
            OrchestratorError::RequestNotFound(_) => SyncError::NotFound(Json(ErrorBody::new(err))),
            OrchestratorError::DuplicateRequest(_)
            | OrchestratorError::InvalidState(_)
            | OrchestratorError::WorkerNotRegistered(_)
            | OrchestratorError::WorkerCannotReachSource(_, _)
            | OrchestratorError::Policy(_) => SyncError::Conflict(Json(ErrorBody::new(err))),
        }
    }
}

/// `POST /sync/{id}/reassign` errors: every `reassign_request` precondition
/// (unreassignable state, unknown worker, worker without source coverage)
/// is a 400, matching the original's blanket `except ValueError` ->
/// `HTTPException(status_code=400, ...)`.
#[derive(ApiResponse, Debug)]
pub enum ReassignError {
    /// The reassignment precondition failed: the request is not QUEUED/FAILED,
    /// the worker is not registered, or it cannot reach the source path.
    #[oai(status = 400)]
    BadRequest(Json<ErrorBody>),
    /// No request with this id is known to the master.
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
}

impl From<OrchestratorError> for ReassignError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::RequestNotFound(_) => ReassignError::NotFound(Json(ErrorBody::new(err))),
            _ => ReassignError::BadRequest(Json(ErrorBody::new(err))),
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct StatusAck {
    pub status: String,
}

#[derive(Debug, Clone, Object)]
pub struct SubmitAck {
    pub status: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Object)]
pub struct ReassignAck {
    pub status: String,
    pub request_id: String,
    pub worker_id: String,
}

#[derive(ApiResponse, Debug)]
pub enum SubmitResponse {
    /// The request was queued successfully.
    #[oai(status = 202)]
    Accepted(Json<SubmitAck>),
}

pub struct SyncApi {
    orchestrator: Arc<Orchestrator>,
}

#[OpenApi(prefix_path = "/sync", tag = ApiTags::Sync)]
impl SyncApi {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Submit a new file-synchronization request.
    #[oai(path = "/", method = "post", operation_id = "submit_sync_request")]
    async fn submit(&self, body: Json<SyncRequest>) -> Result<SubmitResponse, SyncError> {
        let request = body.0;
        let request_id = request.request_id.clone();
        self.orchestrator
            .submit_request(request)
            .instrument(tracing::info_span!("submit_request", request_id = %request_id))
            .await?;
        Ok(SubmitResponse::Accepted(Json(SubmitAck {
            status: "queued".to_string(),
            request_id,
        })))
    }

    /// Fetch the current progress of one request.
    #[oai(path = "/:request_id", method = "get", operation_id = "get_sync_progress")]
    async fn get_progress(
        &self,
        request_id: Path<String>,
    ) -> Result<Json<SyncProgress>, SyncError> {
        self.orchestrator
            .query_progress(&request_id.0)
            .await
            .map(Json)
            .ok_or_else(|| OrchestratorError::RequestNotFound(request_id.0).into())
    }

    /// List the progress of every known request.
    #[oai(path = "/", method = "get", operation_id = "list_sync_requests")]
    async fn list(&self) -> Json<Vec<SyncProgress>> {
        Json(self.orchestrator.list_requests().await)
    }

    /// Forget a request, dropping its in-memory and durable state.
    #[oai(path = "/:request_id", method = "delete", operation_id = "forget_sync_request")]
    async fn forget(&self, request_id: Path<String>) -> Json<StatusAck> {
        self.orchestrator.forget_request(&request_id.0).await;
        Json(StatusAck {
            status: "deleted".to_string(),
        })
    }

    /// Force a QUEUED or FAILED request back to QUEUED, pinned to a specific worker.
    #[oai(path = "/:request_id/reassign", method = "post", operation_id = "reassign_sync_request")]
    async fn reassign(
        &self,
        request_id: Path<String>,
        body: Json<ReassignRequest>,
    ) -> Result<Json<ReassignAck>, ReassignError> {
        let worker_id = body.0.worker_id;
        self.orchestrator
            .reassign_request(&request_id.0, &worker_id)
            .await?;
        Ok(Json(ReassignAck {
            status: "requeued".to_string(),
            request_id: request_id.0,
            worker_id,
        }))
    }
}
