//! Fleet-level aggregation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level derived from the 0-100 truck risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// >=80 critical, 60-79 high, 30-59 medium, <30 low.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 60.0 {
            RiskLevel::High
        } else if score >= 30.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Per-truck aggregated risk, recomputed each snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckRiskScore {
    pub truck_id: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub contributing_factors: Vec<String>,
    pub days_since_last_maintenance: Option<f64>,
    pub active_issues_count: usize,
    /// Soonest predicted failure across this truck's items (days)
    pub predicted_failure_days: Option<f64>,
}

/// Counts of action items by priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencySummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl UrgencySummary {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Fleet trend over the snapshot ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FleetTrend {
    Improving,
    Stable,
    Declining,
}

/// Timestamped fleet health observation. Append-only ring, max 1,000.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetHealthSnapshot {
    pub timestamp: DateTime<Utc>,
    /// 0-100 fleet health score
    pub score: f64,
    /// Operator-facing status label
    pub status: String,
    pub trend: FleetTrend,
    pub description: String,
    pub urgency_summary: UrgencySummary,
    pub total_trucks: usize,
    pub active_trucks: usize,
}

/// Which sub-systems were healthy on this snapshot cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataQuality {
    pub store_healthy: bool,
    pub cache_healthy: bool,
    pub transports_healthy: bool,
    /// Components that hit a programmer-error recovery this cycle
    pub degraded_components: Vec<String>,
    /// Samples dropped for non-monotonic timestamps this cycle
    pub late_samples: u64,
}
