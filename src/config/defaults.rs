//! Built-in default tables
//!
//! Values an operator can override from the TOML file or the
//! `command_center_config` store table. Ranges reflect Class 8 diesel trucks.

use std::collections::BTreeMap;

use super::{FailurePattern, FailureThresholds, SensorPredicate, SensorRange};
use crate::types::SensorId;

/// Valid physical ranges per sensor; readings outside become null.
pub fn sensor_ranges() -> BTreeMap<String, SensorRange> {
    let ranges = [
        (SensorId::CoolantTemp, -40.0, 260.0),
        (SensorId::OilPressure, 0.0, 150.0),
        (SensorId::OilTemp, -40.0, 300.0),
        (SensorId::TransTemp, -40.0, 300.0),
        (SensorId::BatteryVoltage, 0.0, 36.0),
        (SensorId::DefLevel, 0.0, 100.0),
        (SensorId::FuelPct, 0.0, 100.0),
        (SensorId::FuelRate, 0.0, 100.0),
        (SensorId::AmbientTemp, -60.0, 140.0),
        (SensorId::BoostPressure, 0.0, 60.0),
        (SensorId::Rpm, 0.0, 3000.0),
    ];
    ranges
        .into_iter()
        .map(|(sensor, min, max)| (sensor.as_str().to_string(), SensorRange { min, max }))
        .collect()
}

/// Warning/critical extrapolation thresholds for days-to-failure.
pub fn failure_thresholds() -> BTreeMap<String, FailureThresholds> {
    let table = [
        (SensorId::CoolantTemp, 225.0, 240.0, true),
        (SensorId::OilTemp, 240.0, 260.0, true),
        (SensorId::TransTemp, 215.0, 230.0, true),
        (SensorId::OilPressure, 30.0, 20.0, false),
        (SensorId::BatteryVoltage, 12.2, 11.5, false),
        (SensorId::DefLevel, 15.0, 5.0, false),
        (SensorId::BoostPressure, 38.0, 45.0, true),
    ];
    table
        .into_iter()
        .map(|(sensor, warning, critical, higher_is_worse)| {
            (
                sensor.as_str().to_string(),
                FailureThresholds {
                    warning,
                    critical,
                    higher_is_worse,
                },
            )
        })
        .collect()
}

/// Built-in multi-sensor failure patterns.
pub fn failure_patterns() -> Vec<FailurePattern> {
    vec![
        FailurePattern {
            name: "overheating_syndrome".to_string(),
            primary_sensor: SensorId::CoolantTemp,
            predicates: vec![
                SensorPredicate {
                    sensor: SensorId::CoolantTemp,
                    threshold: 235.0,
                    above: true,
                    min_readings: 3,
                },
                SensorPredicate {
                    sensor: SensorId::OilTemp,
                    threshold: 250.0,
                    above: true,
                    min_readings: 3,
                },
                SensorPredicate {
                    sensor: SensorId::TransTemp,
                    threshold: 225.0,
                    above: true,
                    min_readings: 3,
                },
            ],
            predicted_component: "cooling_system".to_string(),
            recommended_action: "Stop safely and inspect cooling system before further operation"
                .to_string(),
            confidence: 0.9,
        },
        FailurePattern {
            name: "oil_pressure_collapse".to_string(),
            primary_sensor: SensorId::OilPressure,
            predicates: vec![
                SensorPredicate {
                    sensor: SensorId::OilPressure,
                    threshold: 22.0,
                    above: false,
                    min_readings: 3,
                },
                SensorPredicate {
                    sensor: SensorId::OilTemp,
                    threshold: 245.0,
                    above: true,
                    min_readings: 3,
                },
            ],
            predicted_component: "oil_system".to_string(),
            recommended_action: "Shut down engine; check oil level, pump and pickup screen"
                .to_string(),
            confidence: 0.85,
        },
        FailurePattern {
            name: "charging_system_failure".to_string(),
            primary_sensor: SensorId::BatteryVoltage,
            predicates: vec![
                SensorPredicate {
                    sensor: SensorId::BatteryVoltage,
                    threshold: 12.8,
                    above: false,
                    min_readings: 4,
                },
                SensorPredicate {
                    sensor: SensorId::Rpm,
                    threshold: 600.0,
                    above: true,
                    min_readings: 4,
                },
            ],
            predicted_component: "electrical_system".to_string(),
            recommended_action: "Check alternator output, belt tension and battery connections"
                .to_string(),
            confidence: 0.8,
        },
        FailurePattern {
            name: "def_depletion".to_string(),
            primary_sensor: SensorId::DefLevel,
            predicates: vec![SensorPredicate {
                sensor: SensorId::DefLevel,
                threshold: 8.0,
                above: false,
                min_readings: 2,
            }],
            predicted_component: "def_system".to_string(),
            recommended_action: "Refill DEF before the ECU commands a derate".to_string(),
            confidence: 0.95,
        },
        FailurePattern {
            name: "turbo_overboost".to_string(),
            primary_sensor: SensorId::BoostPressure,
            predicates: vec![
                SensorPredicate {
                    sensor: SensorId::BoostPressure,
                    threshold: 42.0,
                    above: true,
                    min_readings: 3,
                },
                SensorPredicate {
                    sensor: SensorId::CoolantTemp,
                    threshold: 220.0,
                    above: true,
                    min_readings: 3,
                },
            ],
            predicted_component: "turbocharger".to_string(),
            recommended_action: "Inspect wastegate and charge-air piping".to_string(),
            confidence: 0.75,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supervised_sensor_has_a_range() {
        let ranges = sensor_ranges();
        for sensor in SensorId::ALL {
            assert!(ranges.contains_key(sensor.as_str()), "{sensor} missing");
        }
    }

    #[test]
    fn patterns_lead_with_their_primary_sensor() {
        for pattern in failure_patterns() {
            assert_eq!(
                pattern.predicates.first().map(|p| p.sensor),
                Some(pattern.primary_sensor),
                "{} predicate order",
                pattern.name
            );
            assert!((0.0..=1.0).contains(&pattern.confidence));
        }
    }

    #[test]
    fn failure_thresholds_are_ordered_by_direction() {
        for (name, t) in failure_thresholds() {
            if t.higher_is_worse {
                assert!(t.critical > t.warning, "{name}");
            } else {
                assert!(t.critical < t.warning, "{name}");
            }
        }
    }
}
