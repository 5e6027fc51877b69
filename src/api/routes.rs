//! API route definitions
//!
//! - /command-center/* — fleet dashboard, actions, trends, insights
//! - /sensor-health/*  — GPS, voltage, DTC and idle-validation counters

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{command_center, sensor_health};
use super::ApiState;

/// Build the full application router.
pub fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/command-center/dashboard", get(command_center::dashboard))
        .route("/command-center/actions", get(command_center::actions))
        .route(
            "/command-center/truck/:truck_id",
            get(command_center::truck_detail),
        )
        .route("/command-center/insights", get(command_center::insights))
        .route("/command-center/trends", get(command_center::trends))
        .route(
            "/command-center/trends/record",
            post(command_center::record_trend),
        )
        .route("/command-center/health", get(command_center::health))
        .route("/sensor-health/summary", get(sensor_health::summary))
        .route(
            "/sensor-health/idle-validation",
            get(sensor_health::idle_validation),
        )
        .route(
            "/sensor-health/voltage-history/:truck_id",
            get(sensor_health::voltage_history),
        )
        .route("/sensor-health/gps-quality", get(sensor_health::gps_quality))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
