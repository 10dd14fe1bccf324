//! End-to-end scenarios against a fully bootstrapped, in-memory master.

use chrono::Utc;
use dms_master::api;
use dms_master::bootstrap::Services;
use dms_master::config::{DmsMasterConfig, MetadataStoreConfig};
use dms_master::model::{
    DataPlaneEndpoint, ReassignRequest, RequestLifecycleState, SyncRequest, SyncResult,
    WorkerHeartbeat, WorkerState, MASTER_DETAIL_KEY,
};
use poem::http::StatusCode;
use poem::test::TestClient;
use std::time::Duration;
use test_r::test;

fn in_memory_config() -> DmsMasterConfig {
    let mut config = DmsMasterConfig::default();
    config.metadata_store = MetadataStoreConfig::InMemory;
    config
}

async fn services() -> Services {
    Services::new(&in_memory_config()).await.unwrap()
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

fn request(id: &str, source: &str, destination: &str, files: Option<Vec<&str>>) -> SyncRequest {
    SyncRequest {
        request_id: id.to_string(),
        source_path: source.to_string(),
        destination_path: destination.to_string(),
        file_list: files.map(|fs| fs.into_iter().map(String::from).collect()),
        chunk_size_mb: 64,
    }
}

#[test]
async fn scenario_1_happy_path_two_endpoints_one_worker() {
    let services = services().await;
    let orch = &services.orchestrator;

    orch.submit_request(request(
        "r-1",
        "/a/src",
        "/a/dst",
        Some(vec!["/a/src/f1", "/a/src/f2"]),
    ))
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

    for assignment in [&a1, &a2] {
        orch.report_result(SyncResult {
            request_id: "r-1".into(),
            worker_id: "worker-1".into(),
            success: true,
            message: String::new(),
            completed_at: Utc::now(),
            data_plane_address: Some(assignment.data_plane_address.clone()),
        })
        .await;
    }

    let progress = orch.query_progress("r-1").await.unwrap();
    assert_eq!(progress.state, RequestLifecycleState::Completed);
    assert_eq!(progress.detail.len(), 2);
    assert_eq!(
        progress.detail.get("worker-1::192.168.1.10").map(String::as_str),
        Some("COMPLETED")
    );
    assert_eq!(
        progress.detail.get("worker-1::192.168.1.11").map(String::as_str),
        Some("COMPLETED")
    );
}

#[test]
async fn scenario_2_progress_transition_on_pickup() {
    let services = services().await;
    let orch = &services.orchestrator;

    orch.submit_request(request("r-1", "/a/src", "/a/dst", None))
        .await
        .unwrap();
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
async fn scenario_3_failure_and_reassign() {
    let services = services().await;
    let orch = &services.orchestrator;

    orch.submit_request(request("r-1", "/a/src", "/a/dst", None))
        .await
        .unwrap();
    orch.worker_heartbeat(heartbeat("w-a", &["10.0.0.1"], &["/a"]))
        .await
        .unwrap();
    orch.worker_heartbeat(heartbeat("w-b", &["10.0.0.2"], &["/a"]))
        .await
        .unwrap();

    let a1 = orch
        .next_assignment("w-a", Duration::from_millis(200))
        .await
        .expect("w-a picks up the request");

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

    let reassigned = orch
        .next_assignment("w-b", Duration::from_millis(200))
        .await
        .expect("w-b now receives the assignment");
    assert_eq!(reassigned.worker_id, "w-b");

    let none_for_a = orch.next_assignment("w-a", Duration::from_millis(100)).await;
    assert!(none_for_a.is_none());
}

#[test]
async fn scenario_4_path_eligibility_gating() {
    let services = services().await;
    let orch = &services.orchestrator;

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

    orch.submit_request(request(
        "r-1",
        "/data/source/proj",
        "/data/destination",
        None,
    ))
    .await
    .unwrap();

    let assignment = orch
        .next_assignment("src-worker", Duration::from_millis(200))
        .await
        .expect("only the source-capable worker can receive it");
    assert_eq!(assignment.source_worker_pool, vec!["src-worker".to_string()]);
    assert_eq!(
        assignment.destination_worker_pool,
        vec!["dst-worker".to_string()]
    );

    assert!(orch
        .next_assignment("dst-worker", Duration::from_millis(100))
        .await
        .is_none());
}

#[test]
async fn scenario_5_pre_failure_no_source_pool() {
    let services = services().await;
    let orch = &services.orchestrator;

    orch.worker_heartbeat(heartbeat("w-1", &["10.0.0.1"], &["/elsewhere"]))
        .await
        .unwrap();
    orch.submit_request(request("r-1", "/a/src", "/a/dst", None))
        .await
        .unwrap();

    let progress = orch.query_progress("r-1").await.unwrap();
    assert_eq!(progress.state, RequestLifecycleState::Failed);
    let detail = progress.detail.get(MASTER_DETAIL_KEY).unwrap();
    assert!(detail.starts_with("No workers have access to source path"));
}

#[test]
async fn scenario_6_duplicate_rejection_over_http() {
    let services = services().await;
    let app = api::combined_routes(&services);
    let client = TestClient::new(app);

    let body = serde_json::json!({
        "requestId": "r-1",
        "sourcePath": "/a/src",
        "destinationPath": "/a/dst",
    });

    let first = client.post("/sync/").body_json(&body).send().await;
    first.assert_status(StatusCode::ACCEPTED);

    let second = client.post("/sync/").body_json(&body).send().await;
    second.assert_status(StatusCode::CONFLICT);
}

#[test]
async fn round_trip_submit_then_read_via_http() {
    let services = services().await;
    let app = api::combined_routes(&services);
    let client = TestClient::new(app);

    let body = serde_json::json!({
        "requestId": "r-roundtrip",
        "sourcePath": "/a/src",
        "destinationPath": "/a/dst",
    });
    client
        .post("/sync/")
        .body_json(&body)
        .send()
        .await
        .assert_status(StatusCode::ACCEPTED);

    let get = client.get("/sync/r-roundtrip").send().await;
    get.assert_status_is_ok();
}

#[test]
async fn reassign_rejects_worker_without_source_coverage_over_http() {
    let services = services().await;
    let orch = &services.orchestrator;
    orch.worker_heartbeat(heartbeat("w-a", &["10.0.0.1"], &["/a"]))
        .await
        .unwrap();
    orch.submit_request(request("r-1", "/a/src", "/a/dst", None))
        .await
        .unwrap();

    let app = api::combined_routes(&services);
    let client = TestClient::new(app);
    let response = client
        .post("/sync/r-1/reassign")
        .body_json(&ReassignRequest {
            worker_id: "nonexistent".to_string(),
        })
        .send()
        .await;
    // Every reassign precondition (spec.md §4.6) is a 400, matching the
    // original's blanket `except ValueError -> HTTPException(400, ...)`.
    response.assert_status(StatusCode::BAD_REQUEST);
}
