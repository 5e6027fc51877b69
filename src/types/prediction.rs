//! Days-to-failure prediction types

use serde::{Deserialize, Serialize};

use super::anomaly::TrendDirection;
use super::telemetry::SensorId;

/// Urgency attached to a failure prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionUrgency {
    None,
    Medium,
    High,
    Critical,
}

/// Linear extrapolation of a sensor toward its warning/critical thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePrediction {
    pub sensor: SensorId,
    pub current: f64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub trend_slope_per_day: f64,
    pub trend_direction: TrendDirection,
    /// Days until the warning threshold is crossed, clamped [0.5, 365]
    pub days_to_warning: Option<f64>,
    /// Days until the critical threshold is crossed, clamped [0.5, 365]
    pub days_to_critical: Option<f64>,
    pub urgency: PredictionUrgency,
    pub recommendation: String,
}
