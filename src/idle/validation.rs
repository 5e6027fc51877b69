//! Idle validation against ECU cumulative counters
//!
//! The ECU's idle_hours / engine_hours ratio is ground truth for how much of
//! a truck's runtime is spent idling. When our calculated daily idle hours
//! disagree by more than the configured deviation, the truck's idle data
//! needs investigation (sensor drift, reefer misclassification, PTO use).

use crate::config::IdleConfig;
use crate::types::{IdleConfidence, IdleValidationResult};

/// Cumulative idle-hours values outside this range are physically impossible
/// and force confidence LOW.
const MAX_PLAUSIBLE_IDLE_HOURS: f64 = 100_000.0;

/// Cross-check calculated daily idle hours against ECU counters.
///
/// `calculated_daily_hours` comes from summing per-sample idle windows over
/// the report window; `idle_hours`/`engine_hours` are the ECU cumulative
/// counters from the latest sample.
pub fn validate_against_ecu(
    truck_id: &str,
    calculated_daily_hours: f64,
    idle_hours: Option<f64>,
    engine_hours: Option<f64>,
    config: &IdleConfig,
) -> IdleValidationResult {
    let (Some(idle), Some(engine)) = (idle_hours, engine_hours) else {
        return IdleValidationResult {
            truck_id: truck_id.to_string(),
            is_valid: true,
            needs_investigation: false,
            deviation_pct: 0.0,
            calculated_daily_hours,
            ecu_daily_hours: 0.0,
            confidence: IdleConfidence::Low,
            detail: "ECU counters unavailable; validation skipped".to_string(),
        };
    };

    let mut confidence = IdleConfidence::High;
    if !(0.0..=MAX_PLAUSIBLE_IDLE_HOURS).contains(&idle) || engine <= 0.0 {
        confidence = IdleConfidence::Low;
    }

    // ECU-implied hours idling per 24 h day
    let ratio = if engine > 0.0 { (idle / engine).clamp(0.0, 1.0) } else { 0.0 };
    let ecu_daily_hours = ratio * 24.0;

    let deviation_pct = if ecu_daily_hours > 0.0 {
        (calculated_daily_hours - ecu_daily_hours) / ecu_daily_hours * 100.0
    } else if calculated_daily_hours > 0.0 {
        100.0
    } else {
        0.0
    };

    let exceeded = deviation_pct.abs() > config.validation_deviation_pct;
    let detail = if exceeded {
        format!(
            "calculated {calculated_daily_hours:.1} h/day vs ECU {ecu_daily_hours:.1} h/day ({deviation_pct:+.0}%)"
        )
    } else {
        format!("within {:.0}% of ECU ratio", config.validation_deviation_pct)
    };

    if exceeded && confidence == IdleConfidence::High {
        confidence = IdleConfidence::Medium;
    }

    IdleValidationResult {
        truck_id: truck_id.to_string(),
        is_valid: !exceeded,
        needs_investigation: exceeded,
        deviation_pct,
        calculated_daily_hours,
        ecu_daily_hours,
        confidence,
        detail,
    }
}
