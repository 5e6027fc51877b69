//! Refuel Detector — fuel-jump detection with per-truck adaptive thresholds
//!
//! A refuel is declared when the fuel percentage rises by at least the
//! truck's learned `min_pct` AND the implied gallons exceed `min_gal`.
//! The ECU cumulative fuel-added counter, when it advances by the same
//! magnitude in the same window, upgrades the detection to full confidence.
//!
//! Confirmed refuels feed back into the adaptive learner so each truck's
//! thresholds track its own sensor noise and fueling habits.

mod adaptive;

pub use adaptive::{AdaptiveLearner, AdaptiveLearnerError};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::types::{RefuelEvent, RefuelMethod, TruckStatus};

/// Tolerance when matching a fuel-percent jump against the ECU
/// fuel-added counter (gallons).
const ECU_MATCH_TOLERANCE_GAL: f64 = 2.0;

/// Inputs for one refuel check between two consecutive samples.
#[derive(Debug, Clone, Copy)]
pub struct RefuelObservation {
    pub previous_fuel_pct: f64,
    pub current_fuel_pct: f64,
    /// Tank capacity in gallons, for pct → gallons conversion
    pub tank_capacity_gal: f64,
    /// ECU cumulative fuel-added counter, previous and current (gallons)
    pub previous_fuel_added: Option<f64>,
    pub current_fuel_added: Option<f64>,
    pub status: TruckStatus,
}

/// Check one sample pair against the truck's thresholds.
///
/// Returns the event if the jump clears both the percent and gallon gates.
pub fn detect_refuel(
    truck_id: &str,
    timestamp: DateTime<Utc>,
    obs: RefuelObservation,
    min_pct: f64,
    min_gal: f64,
) -> Option<RefuelEvent> {
    let increase_pct = obs.current_fuel_pct - obs.previous_fuel_pct;
    if increase_pct < min_pct {
        return None;
    }

    let gallons_added = increase_pct / 100.0 * obs.tank_capacity_gal;
    if gallons_added < min_gal {
        debug!(
            truck_id,
            increase_pct, gallons_added, "Fuel jump below gallon gate"
        );
        return None;
    }

    // ECU corroboration: the cumulative fuel-added counter moving by the
    // same magnitude in the same window is definitive.
    let ecu_delta = match (obs.previous_fuel_added, obs.current_fuel_added) {
        (Some(prev), Some(curr)) if curr > prev => Some(curr - prev),
        _ => None,
    };
    let (method, confidence) = match ecu_delta {
        Some(delta) if (delta - gallons_added).abs() <= ECU_MATCH_TOLERANCE_GAL => {
            (RefuelMethod::EcuCounter, 1.0)
        }
        _ => {
            let mut confidence: f64 = 0.7;
            // Larger jumps are harder to fake with slosh
            if increase_pct >= 2.0 * min_pct {
                confidence += 0.1;
            }
            if obs.status == TruckStatus::Stopped {
                confidence += 0.1;
            }
            (RefuelMethod::PctJump, confidence.min(0.9))
        }
    };

    info!(
        truck_id,
        increase_pct,
        gallons_added,
        confidence,
        method = ?method,
        "Refuel detected"
    );

    Some(RefuelEvent {
        truck_id: truck_id.to_string(),
        timestamp,
        fuel_pct_before: obs.previous_fuel_pct,
        fuel_pct_after: obs.current_fuel_pct,
        gallons_added,
        confidence,
        method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(prev: f64, curr: f64, tank: f64) -> RefuelObservation {
        RefuelObservation {
            previous_fuel_pct: prev,
            current_fuel_pct: curr,
            tank_capacity_gal: tank,
            previous_fuel_added: None,
            current_fuel_added: None,
            status: TruckStatus::Stopped,
        }
    }

    #[test]
    fn jump_below_pct_gate_is_ignored() {
        let event = detect_refuel("T001", Utc::now(), obs(50.0, 55.0, 200.0), 8.0, 3.0);
        assert!(event.is_none());
    }

    #[test]
    fn jump_below_gallon_gate_is_ignored() {
        // +10% of a 20 gal tank = 2 gal, under the 3 gal gate
        let event = detect_refuel("T001", Utc::now(), obs(50.0, 60.0, 20.0), 8.0, 3.0);
        assert!(event.is_none());
    }

    #[test]
    fn quarter_tank_step_yields_one_event_with_exact_gallons() {
        let event = detect_refuel("T001", Utc::now(), obs(50.0, 75.0, 200.0), 8.0, 3.0)
            .expect("refuel expected");
        assert!((event.gallons_added - 50.0).abs() < 1e-9);
        assert!(event.confidence >= 0.8);
        assert_eq!(event.method, RefuelMethod::PctJump);
        assert_eq!(event.fuel_pct_before, 50.0);
        assert_eq!(event.fuel_pct_after, 75.0);
    }

    #[test]
    fn ecu_counter_agreement_upgrades_confidence() {
        let mut o = obs(40.0, 65.0, 200.0);
        o.previous_fuel_added = Some(1_000.0);
        o.current_fuel_added = Some(1_050.5); // 50.5 gal vs 50 detected
        let event =
            detect_refuel("T001", Utc::now(), o, 8.0, 3.0).expect("refuel expected");
        assert_eq!(event.method, RefuelMethod::EcuCounter);
        assert!((event.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ecu_counter_disagreement_falls_back_to_pct_jump() {
        let mut o = obs(40.0, 65.0, 200.0);
        o.previous_fuel_added = Some(1_000.0);
        o.current_fuel_added = Some(1_010.0); // 10 gal vs 50 detected
        let event =
            detect_refuel("T001", Utc::now(), o, 8.0, 3.0).expect("refuel expected");
        assert_eq!(event.method, RefuelMethod::PctJump);
        assert!(event.confidence <= 0.9);
    }

    #[test]
    fn moving_truck_gets_lower_confidence() {
        let mut o = obs(50.0, 60.0, 200.0);
        o.status = TruckStatus::Moving;
        let moving = detect_refuel("T001", Utc::now(), o, 8.0, 3.0).expect("event");

        let stopped = detect_refuel("T001", Utc::now(), obs(50.0, 60.0, 200.0), 8.0, 3.0)
            .expect("event");
        assert!(stopped.confidence > moving.confidence);
    }
}
