//! Sensor-health endpoints: GPS quality, voltage history, idle validation

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::alerts::AlertLevel;
use crate::api::envelope::success;
use crate::api::ApiState;

/// GET /sensor-health/summary
pub async fn summary(State(state): State<ApiState>) -> Response {
    let cc = state.coordinator.state().await;

    let total_trucks = cc.trucks.len();
    let mut gps_poor = 0usize;
    let mut voltage_alerts = 0usize;
    let mut dtc_total = 0usize;
    let mut idle_issues = 0usize;
    let mut offline = 0usize;

    for truck in cc.trucks.values() {
        if truck.gps_quality.is_some_and(|q| q < 50.0)
            || truck.satellites.is_some_and(|s| s < 4)
        {
            gps_poor += 1;
        }
        if truck
            .voltage
            .as_ref()
            .is_some_and(|v| v.priority != AlertLevel::Ok)
        {
            voltage_alerts += 1;
        }
        dtc_total += truck.active_dtc_count;
        if truck
            .idle_validation
            .as_ref()
            .is_some_and(|v| v.needs_investigation)
        {
            idle_issues += 1;
        }
        if truck.status == Some(crate::types::TruckStatus::Offline) {
            offline += 1;
        }
    }

    success(json!({
        "total_trucks": total_trucks,
        "gps_poor_quality": gps_poor,
        "voltage_alerts": voltage_alerts,
        "active_dtcs": dtc_total,
        "idle_validation_issues": idle_issues,
        "offline_trucks": offline,
    }))
}

#[derive(Debug, Deserialize)]
pub struct IdleValidationQuery {
    pub truck_id: Option<String>,
    #[serde(default)]
    pub only_issues: bool,
}

/// GET /sensor-health/idle-validation
pub async fn idle_validation(
    State(state): State<ApiState>,
    Query(query): Query<IdleValidationQuery>,
) -> Response {
    let cc = state.coordinator.state().await;
    let mut results: Vec<_> = cc
        .trucks
        .values()
        .filter_map(|t| t.idle_validation.clone())
        .collect();

    if let Some(truck_id) = &query.truck_id {
        results.retain(|r| &r.truck_id == truck_id);
    }
    if query.only_issues {
        results.retain(|r| r.needs_investigation);
    }
    results.sort_by(|a, b| {
        b.deviation_pct
            .abs()
            .partial_cmp(&a.deviation_pct.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    success(json!({ "total": results.len(), "validations": results }))
}

#[derive(Debug, Deserialize)]
pub struct VoltageHistoryQuery {
    pub hours: Option<i64>,
}

/// GET /sensor-health/voltage-history/{truck_id}
pub async fn voltage_history(
    State(state): State<ApiState>,
    Path(truck_id): Path<String>,
    Query(query): Query<VoltageHistoryQuery>,
) -> Response {
    let hours = query.hours.unwrap_or(24).clamp(1, 168);
    let samples = state
        .coordinator
        .gateway()
        .recent_samples(&truck_id, hours, Utc::now())
        .await;

    let points: Vec<_> = samples
        .iter()
        .filter_map(|s| {
            s.battery_voltage.map(|v| {
                json!({
                    "timestamp": s.timestamp.to_rfc3339(),
                    "voltage": v,
                    "rpm": s.rpm,
                    "engine_running": s.is_engine_running(),
                })
            })
        })
        .collect();

    success(json!({
        "truck_id": truck_id,
        "hours": hours,
        "points": points,
    }))
}

/// GET /sensor-health/gps-quality
pub async fn gps_quality(State(state): State<ApiState>) -> Response {
    let cc = state.coordinator.state().await;
    let mut trucks: Vec<_> = cc
        .trucks
        .values()
        .map(|t| {
            json!({
                "truck_id": t.truck_id,
                "gps_quality": t.gps_quality,
                "satellites": t.satellites,
                "status": t.status,
                "last_sample": t.last_sample,
            })
        })
        .collect();
    trucks.sort_by(|a, b| {
        a["truck_id"]
            .as_str()
            .unwrap_or("")
            .cmp(b["truck_id"].as_str().unwrap_or(""))
    });

    success(json!({ "total": trucks.len(), "trucks": trucks }))
}
