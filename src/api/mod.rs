//! HTTP surface for the sync, worker and healthcheck APIs, composed the way
//! `cloud-component-service` assembles its `ApiServices` tuple behind one
//! `OpenApiService`.

use crate::bootstrap::Services;
use poem::Route;
use poem_openapi::{OpenApiService, Tags};
use serde::{Deserialize, Serialize};

pub mod healthcheck;
pub mod sync;
pub mod worker;

#[derive(Tags)]
enum ApiTags {
    Sync,
    Worker,
    HealthCheck,
}

/// Body of every non-2xx response across the API.
#[derive(Debug, Clone, Serialize, Deserialize, poem_openapi::Object)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

type ApiServices = (sync::SyncApi, worker::WorkerApi, healthcheck::HealthcheckApi);

pub fn make_open_api_service(services: &Services) -> OpenApiService<ApiServices, ()> {
    OpenApiService::new(
        (
            sync::SyncApi::new(services.orchestrator.clone()),
            worker::WorkerApi::new(services.orchestrator.clone()),
            healthcheck::HealthcheckApi,
        ),
        "DMS Master API",
        crate::VERSION,
    )
}

pub fn combined_routes(services: &Services) -> Route {
    let api_service = make_open_api_service(services);
    let ui = api_service.swagger_ui();
    let spec = api_service.spec_endpoint_yaml();

    Route::new()
        .nest("/", api_service)
        .nest("/docs", ui)
        .nest("/specs", spec)
}
