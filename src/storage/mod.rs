//! Persistence Gateway
//!
//! Typed read/write operations for every durable entity. The relational
//! store is the system of record; the cache holds the hot copy. Policy:
//!
//! - every write is idempotent per natural key (`truck|timestamp|kind` for
//!   event tables, `truck|sensor` for state tables),
//! - reads consult the cache first with a short TTL, fall back to the
//!   store and repopulate the cache,
//! - cache and store misses return default-constructed state, never errors,
//! - write failures are logged and swallowed so the pipeline keeps moving,
//! - every call carries a deadline.

pub mod cache;
pub mod store;

pub use cache::{Cache, CacheError, InMemoryCache, RedisCache};
pub use store::{SledStore, Store, StoreError};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::correlation::CorrelationEvent;
use crate::types::{
    AdaptiveThreshold, AlgorithmState, Anomaly, FleetHealthSnapshot, IdleValidationResult,
    RefuelEvent, SensorId, TelemetrySample, TruckRiskScore,
};

// Table names, mirrored from the external schema
pub const TABLE_FUEL_METRICS: &str = "fuel_metrics";
pub const TABLE_REFUEL_EVENTS: &str = "refuel_events";
pub const TABLE_ANOMALIES: &str = "anomaly_detections";
pub const TABLE_ANOMALY_HISTORY: &str = "cc_anomaly_history";
pub const TABLE_RISK_HISTORY: &str = "cc_risk_history";
pub const TABLE_ALGORITHM_STATE: &str = "cc_algorithm_state";
pub const TABLE_CORRELATION_EVENTS: &str = "cc_correlation_events";
pub const TABLE_DTC_EVENTS: &str = "dtc_events";
pub const TABLE_IDLE_VALIDATION: &str = "idle_validation_log";
pub const TABLE_ADAPTIVE_THRESHOLDS: &str = "adaptive_refuel_thresholds";
pub const TABLE_HEALTH_SNAPSHOTS: &str = "cc_health_snapshots";

const CACHE_TTL: Duration = Duration::from_secs(60);

/// Gateway over the store + cache pair.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    store_deadline: Duration,
    cache_deadline: Duration,
    store_healthy: Arc<AtomicBool>,
    cache_healthy: Arc<AtomicBool>,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>, config: &PipelineConfig) -> Self {
        Self {
            store,
            cache,
            store_deadline: Duration::from_secs(config.store_timeout_secs),
            cache_deadline: Duration::from_secs(config.cache_timeout_secs),
            store_healthy: Arc::new(AtomicBool::new(true)),
            cache_healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Health flags observed on the most recent operations, for the
    /// snapshot's `data_quality` field.
    pub fn health(&self) -> (bool, bool) {
        (
            self.store_healthy.load(Ordering::Relaxed),
            self.cache_healthy.load(Ordering::Relaxed),
        )
    }

    // ========================================================================
    // Generic helpers
    // ========================================================================

    /// Fire-and-forget store write. Failures are logged and swallowed.
    async fn write(&self, table: &str, key: &str, value: &impl Serialize) {
        let bytes = match serde_json::to_vec(value) {
            Ok(b) => b,
            Err(e) => {
                warn!(table, key, error = %e, "Serialization failed, write dropped");
                return;
            }
        };
        match timeout(self.store_deadline, self.store.put(table, key, bytes)).await {
            Ok(Ok(())) => {
                self.store_healthy.store(true, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.store_healthy.store(false, Ordering::Relaxed);
                warn!(table, key, error = %e, "Store write failed");
            }
            Err(_) => {
                self.store_healthy.store(false, Ordering::Relaxed);
                warn!(table, key, "Store write timed out");
            }
        }
    }

    async fn cache_set(&self, key: &str, value: &impl Serialize) {
        let Ok(bytes) = serde_json::to_vec(value) else {
            return;
        };
        match timeout(self.cache_deadline, self.cache.set(key, bytes, CACHE_TTL)).await {
            Ok(Ok(())) => {
                self.cache_healthy.store(true, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.cache_healthy.store(false, Ordering::Relaxed);
                debug!(key, error = %e, "Cache write failed");
            }
            Err(_) => {
                self.cache_healthy.store(false, Ordering::Relaxed);
                debug!(key, "Cache write timed out");
            }
        }
    }

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match timeout(self.cache_deadline, self.cache.get(key)).await {
            Ok(Ok(Some(bytes))) => {
                self.cache_healthy.store(true, Ordering::Relaxed);
                serde_json::from_slice(&bytes).ok()
            }
            Ok(Ok(None)) => {
                self.cache_healthy.store(true, Ordering::Relaxed);
                None
            }
            Ok(Err(e)) => {
                self.cache_healthy.store(false, Ordering::Relaxed);
                debug!(key, error = %e, "Cache read failed");
                None
            }
            Err(_) => {
                self.cache_healthy.store(false, Ordering::Relaxed);
                None
            }
        }
    }

    async fn store_get<T: DeserializeOwned>(&self, table: &str, key: &str) -> Option<T> {
        match timeout(self.store_deadline, self.store.get(table, key)).await {
            Ok(Ok(Some(bytes))) => {
                self.store_healthy.store(true, Ordering::Relaxed);
                serde_json::from_slice(&bytes).ok()
            }
            Ok(Ok(None)) => {
                self.store_healthy.store(true, Ordering::Relaxed);
                None
            }
            Ok(Err(e)) => {
                self.store_healthy.store(false, Ordering::Relaxed);
                warn!(table, key, error = %e, "Store read failed, using default");
                None
            }
            Err(_) => {
                self.store_healthy.store(false, Ordering::Relaxed);
                warn!(table, key, "Store read timed out, using default");
                None
            }
        }
    }

    async fn store_scan<T: DeserializeOwned>(&self, table: &str, prefix: &str) -> Vec<(String, T)> {
        match timeout(self.store_deadline, self.store.scan_prefix(table, prefix)).await {
            Ok(Ok(entries)) => {
                self.store_healthy.store(true, Ordering::Relaxed);
                entries
                    .into_iter()
                    .filter_map(|(k, v)| serde_json::from_slice(&v).ok().map(|t| (k, t)))
                    .collect()
            }
            Ok(Err(e)) => {
                self.store_healthy.store(false, Ordering::Relaxed);
                warn!(table, prefix, error = %e, "Store scan failed");
                Vec::new()
            }
            Err(_) => {
                self.store_healthy.store(false, Ordering::Relaxed);
                Vec::new()
            }
        }
    }

    /// Whole-table scan (report rollups). Failures come back empty.
    pub async fn scan_table<T: DeserializeOwned>(&self, table: &str) -> Vec<T> {
        self.store_scan::<T>(table, "")
            .await
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    // ========================================================================
    // Algorithm state (C5)
    // ========================================================================

    fn algorithm_state_key(truck_id: &str, sensor: SensorId) -> String {
        format!("{truck_id}|{sensor}")
    }

    /// Checkpoint streaming state: store is the record, cache the hot copy.
    pub async fn save_algorithm_state(
        &self,
        truck_id: &str,
        sensor: SensorId,
        state: &AlgorithmState,
    ) {
        let key = Self::algorithm_state_key(truck_id, sensor);
        self.write(TABLE_ALGORITHM_STATE, &key, state).await;
        self.cache_set(&format!("algstate:{key}"), state).await;
    }

    /// Cache → store → default.
    pub async fn load_algorithm_state(&self, truck_id: &str, sensor: SensorId) -> AlgorithmState {
        let key = Self::algorithm_state_key(truck_id, sensor);
        if let Some(state) = self.cache_get(&format!("algstate:{key}")).await {
            return state;
        }
        match self.store_get::<AlgorithmState>(TABLE_ALGORITHM_STATE, &key).await {
            Some(state) => {
                self.cache_set(&format!("algstate:{key}"), &state).await;
                state
            }
            None => AlgorithmState::default(),
        }
    }

    /// Every persisted sensor state for one truck.
    pub async fn load_truck_algorithm_states(
        &self,
        truck_id: &str,
    ) -> HashMap<SensorId, AlgorithmState> {
        let prefix = format!("{truck_id}|");
        self.store_scan::<AlgorithmState>(TABLE_ALGORITHM_STATE, &prefix)
            .await
            .into_iter()
            .filter_map(|(key, state)| {
                key.strip_prefix(&prefix)
                    .and_then(SensorId::parse)
                    .map(|sensor| (sensor, state))
            })
            .collect()
    }

    // ========================================================================
    // Adaptive thresholds (C4)
    // ========================================================================

    pub async fn save_adaptive_threshold(&self, threshold: &AdaptiveThreshold) {
        self.write(TABLE_ADAPTIVE_THRESHOLDS, &threshold.truck_id, threshold)
            .await;
    }

    pub async fn load_adaptive_threshold(&self, truck_id: &str) -> Option<AdaptiveThreshold> {
        self.store_get(TABLE_ADAPTIVE_THRESHOLDS, truck_id).await
    }

    // ========================================================================
    // Append-only events
    // ========================================================================

    pub async fn record_refuel_event(&self, event: &RefuelEvent) {
        let key = format!("{}|{}|refuel", event.truck_id, event.timestamp.to_rfc3339());
        self.write(TABLE_REFUEL_EVENTS, &key, event).await;
    }

    pub async fn record_anomaly(&self, anomaly: &Anomaly) {
        let key = format!(
            "{}|{}|{:?}|{}",
            anomaly.truck_id,
            anomaly.timestamp.to_rfc3339(),
            anomaly.kind,
            anomaly.sensor
        );
        self.write(TABLE_ANOMALIES, &key, anomaly).await;
        self.write(TABLE_ANOMALY_HISTORY, &key, anomaly).await;
    }

    pub async fn record_correlation_event(&self, event: &CorrelationEvent) {
        let key = format!(
            "{}|{}|{}",
            event.truck_id,
            event.timestamp.to_rfc3339(),
            event.pattern_name
        );
        self.write(TABLE_CORRELATION_EVENTS, &key, event).await;
    }

    pub async fn record_risk_score(&self, score: &TruckRiskScore, timestamp: DateTime<Utc>) {
        let key = format!("{}|{}", score.truck_id, timestamp.to_rfc3339());
        self.write(TABLE_RISK_HISTORY, &key, score).await;
    }

    pub async fn record_idle_validation(
        &self,
        result: &IdleValidationResult,
        timestamp: DateTime<Utc>,
    ) {
        let key = format!("{}|{}", result.truck_id, timestamp.to_rfc3339());
        self.write(TABLE_IDLE_VALIDATION, &key, result).await;
    }

    pub async fn record_dtc_event(&self, truck_id: &str, code: &str, timestamp: DateTime<Utc>) {
        let key = format!("{truck_id}|{}|{code}", timestamp.to_rfc3339());
        self.write(TABLE_DTC_EVENTS, &key, &serde_json::json!({
            "truck_id": truck_id,
            "code": code,
            "timestamp": timestamp.to_rfc3339(),
        }))
        .await;
    }

    /// Enriched sample row (best-effort, batched by the orchestrator).
    pub async fn record_sample(&self, sample: &TelemetrySample) {
        let key = format!("{}|{}", sample.truck_id, sample.timestamp.to_rfc3339());
        self.write(TABLE_FUEL_METRICS, &key, sample).await;
    }

    pub async fn record_health_snapshot(&self, snapshot: &FleetHealthSnapshot) {
        let key = snapshot.timestamp.to_rfc3339();
        self.write(TABLE_HEALTH_SNAPSHOTS, &key, snapshot).await;
    }

    // ========================================================================
    // Queries backing the HTTP surface
    // ========================================================================

    /// Samples for one truck within the last `hours` (voltage history etc.).
    pub async fn recent_samples(
        &self,
        truck_id: &str,
        hours: i64,
        now: DateTime<Utc>,
    ) -> Vec<TelemetrySample> {
        let cutoff = now - ChronoDuration::hours(hours);
        self.store_scan::<TelemetrySample>(TABLE_FUEL_METRICS, &format!("{truck_id}|"))
            .await
            .into_iter()
            .map(|(_, s)| s)
            .filter(|s| s.timestamp >= cutoff)
            .collect()
    }

    /// Recent refuel events for one truck.
    pub async fn recent_refuels(&self, truck_id: &str) -> Vec<RefuelEvent> {
        self.store_scan::<RefuelEvent>(TABLE_REFUEL_EVENTS, &format!("{truck_id}|"))
            .await
            .into_iter()
            .map(|(_, e)| e)
            .collect()
    }

    /// Latest idle validation per truck (empty prefix scans everything).
    pub async fn idle_validations(&self, truck_prefix: &str) -> Vec<IdleValidationResult> {
        self.store_scan::<IdleValidationResult>(TABLE_IDLE_VALIDATION, truck_prefix)
            .await
            .into_iter()
            .map(|(_, r)| r)
            .collect()
    }
}
