//! Command-center endpoints: dashboard, actions, trucks, insights, trends

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::api::envelope::{internal_error, success, success_cached};
use crate::api::ApiState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub bypass_cache: bool,
}

/// GET /command-center/dashboard
pub async fn dashboard(
    State(state): State<ApiState>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    if !query.bypass_cache {
        if let Some(cached) = state.cached_dashboard().await {
            return success_cached(cached, true);
        }
    }

    let payload = match build_dashboard(&state).await {
        Ok(p) => p,
        Err(e) => return internal_error(e),
    };
    state.store_dashboard(payload.clone()).await;
    success_cached(payload, false)
}

async fn build_dashboard(state: &ApiState) -> Result<serde_json::Value, String> {
    let cc = state.coordinator.state().await;
    let trucks: Vec<_> = cc.trucks.values().collect();
    let mut action_items: Vec<_> = trucks.iter().flat_map(|t| t.items.iter()).collect();
    action_items.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    serde_json::to_value(json!({
        "fleet_health": cc.fleet.health,
        "insights": cc.fleet.insights,
        "data_quality": cc.fleet.data_quality,
        "action_items": action_items,
        "fleet_items": cc.fleet.fleet_items,
        "trucks": cc.trucks,
        "generated_at": Utc::now().to_rfc3339(),
    }))
    .map_err(|e| e.to_string())
}

#[derive(Debug, Deserialize)]
pub struct ActionsQuery {
    pub priority: Option<String>,
    pub category: Option<String>,
    pub truck_id: Option<String>,
    pub limit: Option<usize>,
}

/// GET /command-center/actions
pub async fn actions(
    State(state): State<ApiState>,
    Query(query): Query<ActionsQuery>,
) -> Response {
    let cc = state.coordinator.state().await;
    let mut items: Vec<_> = cc
        .trucks
        .values()
        .flat_map(|t| t.items.iter().cloned())
        .chain(cc.fleet.fleet_items.iter().cloned())
        .collect();

    if let Some(priority) = &query.priority {
        let wanted = priority.to_uppercase();
        items.retain(|i| i.priority.to_string() == wanted);
    }
    if let Some(category) = &query.category {
        let wanted = category.to_lowercase();
        items.retain(|i| i.category.to_string() == wanted);
    }
    if let Some(truck_id) = &query.truck_id {
        items.retain(|i| &i.truck_id == truck_id);
    }
    items.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let total = items.len();
    if let Some(limit) = query.limit {
        items.truncate(limit);
    }

    success(json!({ "total": total, "actions": items }))
}

/// GET /command-center/truck/{truck_id}
pub async fn truck_detail(
    State(state): State<ApiState>,
    Path(truck_id): Path<String>,
) -> Response {
    let cc = state.coordinator.state().await;
    match cc.trucks.get(&truck_id) {
        Some(truck) => success(json!({ "truck": truck })),
        None => success(json!({ "truck": null, "message": format!("{truck_id} not yet observed") })),
    }
}

/// GET /command-center/insights
pub async fn insights(State(state): State<ApiState>) -> Response {
    let cc = state.coordinator.state().await;
    success(json!({
        "insights": cc.fleet.insights,
        "fleet_health": cc.fleet.health,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub hours: Option<i64>,
}

/// GET /command-center/trends
pub async fn trends(State(state): State<ApiState>, Query(query): Query<TrendsQuery>) -> Response {
    let hours = query.hours.unwrap_or(24).clamp(1, 168);
    let ring = state.coordinator.trend_ring();
    let snapshots = ring.recent(hours, Utc::now());
    let trend = ring.calculate_trend(20);
    success(json!({
        "hours": hours,
        "trend": trend,
        "snapshots": snapshots,
    }))
}

/// POST /command-center/trends/record — force a trend snapshot now.
pub async fn record_trend(State(state): State<ApiState>) -> Response {
    let snapshot = state.coordinator.aggregate_fleet(Utc::now()).await;
    success(json!({ "recorded": snapshot }))
}

/// GET /command-center/health — liveness + version.
pub async fn health(State(state): State<ApiState>) -> Response {
    let (store_healthy, cache_healthy) = state.coordinator.gateway().health();
    success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store_healthy": store_healthy,
        "cache_healthy": cache_healthy,
    }))
}

