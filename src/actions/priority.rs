//! Priority scoring, action IDs and the source hierarchy
//!
//! The priority score blends four sub-signals (days urgency, anomaly score,
//! component criticality, cost) with fixed weights, renormalizing when a
//! sub-signal is absent. The score is a monotone non-increasing function of
//! `days_to_critical` with everything else held constant.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::PriorityConfig;
use crate::types::{ActionType, CostRange, Priority};

use super::components::MAX_CRITICALITY;

/// Sub-signals feeding one item's priority score.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityInputs {
    pub days_to_critical: Option<f64>,
    /// Detector score, either 0-1 or 0-100
    pub anomaly_score: Option<f64>,
    /// Raw component criticality (0.8 .. 3.0)
    pub criticality: Option<f64>,
    pub cost: Option<CostRange>,
}

/// Blend the sub-signals into a 0-100 priority score.
///
/// Missing sub-signals are omitted and the remaining weights renormalized;
/// with no signals at all the item defaults to 50 (MEDIUM).
pub fn priority_score(inputs: PriorityInputs, config: &PriorityConfig) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    if let Some(days) = inputs.days_to_critical {
        weighted_sum += config.days_weight * days_urgency(days, config);
        weight_total += config.days_weight;
    }
    if let Some(score) = inputs.anomaly_score {
        weighted_sum += config.anomaly_weight * normalize_anomaly_score(score);
        weight_total += config.anomaly_weight;
    }
    if let Some(criticality) = inputs.criticality {
        let scaled = (100.0 * criticality / MAX_CRITICALITY).clamp(0.0, 100.0);
        weighted_sum += config.criticality_weight * scaled;
        weight_total += config.criticality_weight;
    }
    if let Some(cost) = inputs.cost {
        weighted_sum += config.cost_weight * cost_factor(cost.avg);
        weight_total += config.cost_weight;
    }

    if weight_total <= 0.0 {
        return 50.0;
    }
    (weighted_sum / weight_total).clamp(0.0, 100.0)
}

/// Exponential urgency curve: 100 at zero days, decaying 4%/day, floored.
pub fn days_urgency(days_to_critical: f64, config: &PriorityConfig) -> f64 {
    if days_to_critical <= 0.0 {
        return 100.0;
    }
    (100.0 * (-config.days_decay * days_to_critical).exp()).max(config.days_floor)
}

/// Accept detector scores on either a 0-1 or 0-100 scale.
pub fn normalize_anomaly_score(score: f64) -> f64 {
    let scaled = if score <= 1.0 { score * 100.0 } else { score };
    scaled.clamp(0.0, 100.0)
}

/// Map a dollar figure onto 0-100, log-linear through the anchor points
/// $500 → 10, $5k → 50, $15k → 100.
pub fn cost_factor(avg_cost: f64) -> f64 {
    if avg_cost <= 0.0 {
        return 0.0;
    }
    if avg_cost <= 500.0 {
        return (10.0 * avg_cost / 500.0).max(0.0);
    }
    if avg_cost <= 5_000.0 {
        let t = (avg_cost / 500.0).log10(); // 0..1 over one decade
        return 10.0 + 40.0 * t;
    }
    let t = (avg_cost / 5_000.0).log10() / 3.0f64.log10(); // 0..1 over 5k→15k
    (50.0 + 50.0 * t).min(100.0)
}

/// Derive the recommended action from priority and time horizon.
pub fn action_type_for(priority: Priority, days_to_critical: Option<f64>) -> ActionType {
    match priority {
        Priority::Critical => match days_to_critical {
            Some(days) if days <= 1.0 => ActionType::StopImmediately,
            _ => ActionType::ScheduleThisWeek,
        },
        Priority::High => ActionType::ScheduleThisWeek,
        Priority::Medium => ActionType::ScheduleThisMonth,
        Priority::Low => ActionType::Monitor,
        Priority::None => ActionType::NoAction,
    }
}

/// Generate an action ID: `ACT-YYYYMMDD-XXXXXXXX`.
///
/// The hex suffix comes from the OS RNG, collision-resistant across
/// concurrent generators.
pub fn generate_action_id(now: DateTime<Utc>) -> String {
    let suffix = OsRng.next_u32();
    format!("ACT-{}-{suffix:08X}", now.format("%Y%m%d"))
}

// ============================================================================
// Source hierarchy
// ============================================================================

/// Weight of a detector source for tie-breaking and display selection.
pub fn source_weight(source: &str) -> u32 {
    match source {
        "Real-Time Predictive" => 90,
        "Predictive Maintenance Engine" => 80,
        "Failure Correlation" => 75,
        "Sensor Health" => 60,
        "ML Anomaly Detection" => 55,
        "DTC Analysis" => 50,
        "Driver Scoring" => 35,
        _ => 25,
    }
}

/// Strongest source in a list, `"Unknown"` when empty.
pub fn best_source(sources: &[String]) -> &str {
    sources
        .iter()
        .max_by_key(|s| source_weight(s))
        .map_or("Unknown", String::as_str)
}
