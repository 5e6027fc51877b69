//! Telemetry sample validation
//!
//! A sample is never rejected wholesale for bad sensor data: out-of-range or
//! non-finite readings are nulled field by field and the rest of the sample
//! survives. Only a non-monotonic timestamp discards the sample (counted by
//! the caller in the late-sample metric).

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::FleetConfig;
use crate::types::{SensorId, TelemetrySample};

/// What validation did to a sample.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Sensors nulled for being out of range
    pub out_of_range: Vec<SensorId>,
    /// Sensors nulled for NaN/±∞
    pub non_finite: Vec<SensorId>,
}

impl ValidationOutcome {
    pub fn is_clean(&self) -> bool {
        self.out_of_range.is_empty() && self.non_finite.is_empty()
    }
}

/// Null every non-finite or out-of-range sensor field in place.
pub fn validate_fields(sample: &mut TelemetrySample, config: &FleetConfig) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for sensor in SensorId::ALL {
        let Some(value) = sensor.value_of(sample) else {
            continue;
        };

        if !value.is_finite() {
            sensor.clear_on(sample);
            outcome.non_finite.push(sensor);
            debug!(truck_id = %sample.truck_id, sensor = %sensor, "Nulled non-finite reading");
            continue;
        }

        if let Some(range) = config.sensors.range_for(sensor) {
            if value < range.min || value > range.max {
                sensor.clear_on(sample);
                outcome.out_of_range.push(sensor);
                debug!(
                    truck_id = %sample.truck_id,
                    sensor = %sensor,
                    value,
                    min = range.min,
                    max = range.max,
                    "Nulled out-of-range reading"
                );
            }
        }
    }

    // Non-finite values can also arrive on unsupervised numeric fields.
    for field in [
        &mut sample.speed_mph,
        &mut sample.fuel_liters,
        &mut sample.odometer_mi,
        &mut sample.engine_hours,
        &mut sample.idle_hours,
        &mut sample.total_idle_fuel_gal,
        &mut sample.total_fuel_added_gal,
        &mut sample.gps_quality,
    ] {
        if field.is_some_and(|v| !v.is_finite()) {
            *field = None;
        }
    }

    outcome
}

/// Timestamp gate: the sample must be strictly newer than the last one
/// processed for this truck. Late and duplicate samples are dropped.
pub fn is_monotonic(last: Option<DateTime<Utc>>, timestamp: DateTime<Utc>) -> bool {
    match last {
        Some(prev) => timestamp > prev,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySample {
        TelemetrySample::new("T001", Utc::now())
    }

    #[test]
    fn out_of_range_reading_is_nulled_others_survive() {
        let config = FleetConfig::default();
        let mut s = sample();
        s.oil_pressure_psi = Some(400.0); // above 150 psi ceiling
        s.coolant_temp_f = Some(190.0);

        let outcome = validate_fields(&mut s, &config);

        assert_eq!(s.oil_pressure_psi, None);
        assert_eq!(s.coolant_temp_f, Some(190.0));
        assert_eq!(outcome.out_of_range, vec![SensorId::OilPressure]);
    }

    #[test]
    fn nan_and_infinity_coerce_to_null() {
        let config = FleetConfig::default();
        let mut s = sample();
        s.coolant_temp_f = Some(f64::NAN);
        s.battery_voltage = Some(f64::INFINITY);
        s.odometer_mi = Some(f64::NEG_INFINITY);

        let outcome = validate_fields(&mut s, &config);

        assert_eq!(s.coolant_temp_f, None);
        assert_eq!(s.battery_voltage, None);
        assert_eq!(s.odometer_mi, None);
        assert_eq!(outcome.non_finite.len(), 2);
    }

    #[test]
    fn boundary_values_are_valid() {
        let config = FleetConfig::default();
        let mut s = sample();
        s.oil_pressure_psi = Some(150.0);
        s.coolant_temp_f = Some(-40.0);

        let outcome = validate_fields(&mut s, &config);

        assert!(outcome.is_clean());
        assert_eq!(s.oil_pressure_psi, Some(150.0));
    }

    #[test]
    fn monotonic_gate_drops_duplicates_and_late_samples() {
        let now = Utc::now();
        assert!(is_monotonic(None, now));
        assert!(is_monotonic(Some(now - chrono::Duration::seconds(15)), now));
        assert!(!is_monotonic(Some(now), now));
        assert!(!is_monotonic(Some(now + chrono::Duration::seconds(1)), now));
    }
}
