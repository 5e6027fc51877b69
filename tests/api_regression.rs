//! API Regression Tests
//!
//! Exercises every route against a coordinator fed with a small sample set,
//! asserting status codes and the response envelope (`success: true`,
//! `cached` where caching applies).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tower::ServiceExt;

use fuel_copilot::alerts::{AlertDispatcher, AlertTransport, CaptureTransport};
use fuel_copilot::api::{api_router, ApiState};
use fuel_copilot::config::{ConfigHandle, FleetConfig};
use fuel_copilot::pipeline::PipelineCoordinator;
use fuel_copilot::storage::{InMemoryCache, PersistenceGateway, SledStore};
use fuel_copilot::types::{TelemetrySample, TruckStatus};

async fn test_app() -> (axum::Router, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = FleetConfig::default();
    config.paths.data_dir = tmp.path().to_path_buf();
    config.paths.adaptive_thresholds_file = tmp.path().join("adaptive_refuel_thresholds.json");
    let handle = ConfigHandle::new(config);

    let store = Arc::new(SledStore::temporary().expect("sled"));
    let cache = Arc::new(InMemoryCache::new());
    let gateway = PersistenceGateway::new(store, cache, &handle.get().pipeline);
    let dispatcher = Arc::new(AlertDispatcher::new(
        60,
        Some(Arc::new(CaptureTransport::new()) as Arc<dyn AlertTransport>),
        None,
    ));
    let coordinator = Arc::new(PipelineCoordinator::new(
        handle.clone(),
        gateway,
        dispatcher,
    ));

    // Seed two trucks: one hot, one healthy
    let t0 = Utc::now() - Duration::minutes(5);
    for i in 0..4 {
        let mut hot = TelemetrySample::new("T001", t0 + Duration::seconds(i * 20));
        hot.status = TruckStatus::Stopped;
        hot.rpm = Some(700.0);
        hot.coolant_temp_f = Some(245.0);
        hot.oil_temp_f = Some(260.0);
        hot.trans_temp_f = Some(235.0);
        hot.battery_voltage = Some(13.9);
        hot.gps_quality = Some(90.0);
        hot.satellites = Some(11);
        coordinator.ingest(hot).await;

        let mut healthy = TelemetrySample::new("T002", t0 + Duration::seconds(i * 20));
        healthy.status = TruckStatus::Moving;
        healthy.speed_mph = Some(55.0);
        healthy.rpm = Some(1400.0);
        healthy.coolant_temp_f = Some(195.0);
        healthy.battery_voltage = Some(14.1);
        coordinator.ingest(healthy).await;
    }
    coordinator.aggregate_fleet(Utc::now()).await;

    let state = ApiState::new(coordinator, handle);
    (api_router(state), tmp)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn dashboard_returns_snapshot_with_cache_flag() {
    let (app, _tmp) = test_app().await;

    let (status, body) = get_json(&app, "/command-center/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["cached"], false);
    assert!(body["trucks"]["T001"].is_object());
    assert!(body["fleet_health"].is_object());

    // Second read hits the cache
    let (_, body) = get_json(&app, "/command-center/dashboard").await;
    assert_eq!(body["cached"], true);

    // bypass_cache forces a rebuild
    let (_, body) = get_json(&app, "/command-center/dashboard?bypass_cache=true").await;
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn actions_filtering_works() {
    let (app, _tmp) = test_app().await;

    let (status, body) = get_json(&app, "/command-center/actions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let total = body["total"].as_u64().expect("total");
    assert!(total >= 1, "hot truck must produce actions");

    let (_, body) = get_json(&app, "/command-center/actions?truck_id=T002").await;
    let t2_actions = body["actions"].as_array().expect("array");
    assert!(t2_actions
        .iter()
        .all(|a| a["truck_id"] == "T002"));

    let (_, body) = get_json(&app, "/command-center/actions?priority=CRITICAL&limit=1").await;
    let actions = body["actions"].as_array().expect("array");
    assert!(actions.len() <= 1);
    assert!(actions.iter().all(|a| a["priority"] == "CRITICAL"));
}

#[tokio::test]
async fn truck_detail_known_and_unknown() {
    let (app, _tmp) = test_app().await;

    let (status, body) = get_json(&app, "/command-center/truck/T001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["truck"]["truck_id"], "T001");

    let (status, body) = get_json(&app, "/command-center/truck/GHOST").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["truck"].is_null());
}

#[tokio::test]
async fn insights_and_trends_endpoints() {
    let (app, _tmp) = test_app().await;

    let (status, body) = get_json(&app, "/command-center/insights").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["insights"].is_array());

    let (status, body) = get_json(&app, "/command-center/trends?hours=24").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 24);
    assert!(body["snapshots"].as_array().expect("array").len() >= 1);

    // Out-of-range hours clamp instead of failing
    let (status, body) = get_json(&app, "/command-center/trends?hours=9999").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 168);
}

#[tokio::test]
async fn force_trend_record_appends_snapshot() {
    let (app, _tmp) = test_app().await;

    let before = get_json(&app, "/command-center/trends?hours=24")
        .await
        .1["snapshots"]
        .as_array()
        .map_or(0, Vec::len);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/command-center/trends/record")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let after = get_json(&app, "/command-center/trends?hours=24")
        .await
        .1["snapshots"]
        .as_array()
        .map_or(0, Vec::len);
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn health_reports_version_and_store_state() {
    let (app, _tmp) = test_app().await;
    let (status, body) = get_json(&app, "/command-center/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["store_healthy"], true);
}

#[tokio::test]
async fn sensor_health_surface() {
    let (app, _tmp) = test_app().await;

    let (status, body) = get_json(&app, "/sensor-health/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_trucks"], 2);

    let (status, body) = get_json(&app, "/sensor-health/gps-quality").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, body) = get_json(&app, "/sensor-health/idle-validation?only_issues=true").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["validations"].is_array());

    let (status, body) = get_json(&app, "/sensor-health/voltage-history/T001?hours=24").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["truck_id"], "T001");
    let points = body["points"].as_array().expect("points");
    assert!(points.len() >= 1, "voltage samples were stored");
}
