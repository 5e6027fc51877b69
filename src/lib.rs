//! Fuel Copilot — fleet fuel analytics and predictive maintenance core
//!
//! Ingests high-frequency telemetry from heavy trucks and turns it into a
//! ranked maintenance action list, per-truck risk and fleet-wide health:
//!
//! - **Telemetry**: validation and per-sensor baselines (Welford)
//! - **Idle / Refuel**: hybrid idle estimator, adaptive refuel detection
//! - **Streaming**: persistent EWMA/CUSUM detectors with trend fitting
//! - **Prediction / Correlation**: days-to-failure and multi-sensor patterns
//! - **Actions**: synthesis, deduplication, priority scoring
//! - **Scoring**: truck risk and fleet health with a trend ring
//! - **Alerts**: cooldown-gated SMS/email dispatch
//! - **Pipeline**: sharded single-writer-per-truck orchestration
//! - **API**: command-center and sensor-health HTTP surfaces

pub mod actions;
pub mod alerts;
pub mod api;
pub mod config;
pub mod correlation;
pub mod idle;
pub mod pipeline;
pub mod prediction;
pub mod refuel;
pub mod report;
pub mod scoring;
pub mod storage;
pub mod streaming;
pub mod telemetry;
pub mod types;
pub mod voltage;

/// Liters per US gallon, the conversion every fuel path shares.
pub const LITERS_PER_GALLON: f64 = 3.78541;

// Re-export the types most callers touch
pub use config::{ConfigHandle, FleetConfig};
pub use pipeline::PipelineCoordinator;
pub use types::{
    ActionItem, AlgorithmState, Anomaly, FleetHealthSnapshot, IdleReading, Priority, RefuelEvent,
    TelemetrySample, TruckRiskScore, TruckStatus,
};
