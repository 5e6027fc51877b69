//! HTTP API layer
//!
//! Routes the command-center and sensor-health surfaces onto the pipeline
//! coordinator's snapshot state. Handlers are read-mostly; the only write
//! endpoint forces a trend snapshot.

pub mod envelope;
pub mod handlers;
pub mod routes;

pub use routes::api_router;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::ConfigHandle;
use crate::pipeline::PipelineCoordinator;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<PipelineCoordinator>,
    pub config: ConfigHandle,
    dashboard_cache: Arc<Mutex<Option<(Instant, serde_json::Value)>>>,
}

impl ApiState {
    pub fn new(coordinator: Arc<PipelineCoordinator>, config: ConfigHandle) -> Self {
        Self {
            coordinator,
            config,
            dashboard_cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Cached dashboard payload if it is still fresh.
    pub async fn cached_dashboard(&self) -> Option<serde_json::Value> {
        let ttl = Duration::from_secs(self.config.get().server.snapshot_cache_secs);
        let cache = self.dashboard_cache.lock().await;
        match cache.as_ref() {
            Some((at, payload)) if at.elapsed() < ttl => Some(payload.clone()),
            _ => None,
        }
    }

    pub async fn store_dashboard(&self, payload: serde_json::Value) {
        let mut cache = self.dashboard_cache.lock().await;
        *cache = Some((Instant::now(), payload));
    }
}
