//! Anomaly events and streaming algorithm state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::telemetry::SensorId;

/// Detector family that raised the anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// Out of configured range, gated through the persistence check
    Threshold,
    /// Sustained drift from the exponentially weighted mean
    Ewma,
    /// CUSUM change-point alarm
    Cusum,
    /// Multi-sensor failure-pattern match
    Correlation,
}

/// Anomaly severity ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One anomaly appended to the anomaly log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub truck_id: String,
    pub sensor: SensorId,
    pub timestamp: DateTime<Utc>,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub sensor_value: f64,
    pub ewma_value: f64,
    pub cusum_value: f64,
    pub threshold: f64,
    pub z_score: f64,
}

/// Recent trend direction for a supervised sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Stable,
}

/// Persistent streaming state for one (truck, sensor) pair.
///
/// Restored from the store at startup so restarts resume cleanly.
/// Both CUSUM accumulators are stored as non-negative magnitudes and
/// reset to zero on the cycle their one-sided alarm fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmState {
    pub ewma: f64,
    pub ewma_variance: f64,
    pub cusum_pos: f64,
    pub cusum_neg: f64,
    pub samples: u64,
    pub trend: TrendDirection,
    pub trend_slope_per_day: f64,
}

impl Default for AlgorithmState {
    fn default() -> Self {
        Self {
            ewma: 0.0,
            ewma_variance: 0.0,
            cusum_pos: 0.0,
            cusum_neg: 0.0,
            samples: 0,
            trend: TrendDirection::Stable,
            trend_slope_per_day: 0.0,
        }
    }
}

impl AlgorithmState {
    /// EWMA standard deviation from the smoothed residual variance.
    pub fn ewma_std(&self) -> f64 {
        self.ewma_variance.max(0.0).sqrt()
    }
}
