//! Refuel detection types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a refuel was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefuelMethod {
    /// Fuel-percentage jump over adaptive thresholds
    PctJump,
    /// Corroborated by the ECU cumulative fuel-added counter
    EcuCounter,
    /// Operator-entered
    Manual,
}

/// A detected refuel. Written once, immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefuelEvent {
    pub truck_id: String,
    pub timestamp: DateTime<Utc>,
    pub fuel_pct_before: f64,
    pub fuel_pct_after: f64,
    pub gallons_added: f64,
    /// Detection confidence 0-1
    pub confidence: f64,
    pub method: RefuelMethod,
}

/// Per-truck learned refuel-detection thresholds.
///
/// Learned from confirmed refuel history; clamped to the configured
/// floor/ceiling so a noisy sensor can never silence detection entirely
/// nor flood it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    pub truck_id: String,
    /// Minimum fuel-percent increase to consider a refuel
    pub min_pct: f64,
    /// Minimum gallons added to consider a refuel
    pub min_gal: f64,
    /// Running std-dev of this truck's fuel sensor, used to widen thresholds
    pub sensor_variance: f64,
    /// Confirmed refuels backing the learned values
    pub confirmed_refuels: usize,
    pub last_updated: DateTime<Utc>,
}

impl AdaptiveThreshold {
    pub fn with_defaults(truck_id: impl Into<String>, min_pct: f64, min_gal: f64) -> Self {
        Self {
            truck_id: truck_id.into(),
            min_pct,
            min_gal,
            sensor_variance: 1.0,
            confirmed_refuels: 0,
            last_updated: Utc::now(),
        }
    }
}

/// One confirmed refuel observation kept for threshold learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedRefuel {
    pub increase_pct: f64,
    pub increase_gal: f64,
    pub confidence: f64,
}
