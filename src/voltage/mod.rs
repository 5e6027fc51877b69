//! Voltage Monitor — battery and alternator health from `pwr_int`
//!
//! The interpretation of a voltage reading depends on whether the engine is
//! running: below ~12.2 V at rest the battery is discharging, but 13.2 V
//! with the engine at speed means the alternator is not charging. Low
//! voltage also degrades other sensors, so the analysis flags when readings
//! elsewhere should be distrusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertLevel;

/// Electrical system state classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoltageStatus {
    /// Battery will not crank / alternator dead
    CriticalLow,
    Low,
    Normal,
    High,
    /// Overvoltage — electronics damage risk
    CriticalHigh,
}

/// Voltage thresholds for Class 8 trucks (12 V system).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoltageThresholds {
    // Engine off (battery state)
    pub battery_critical_low: f64,
    pub battery_low: f64,
    pub battery_normal_max: f64,
    // Engine running (charging system)
    pub charging_critical_low: f64,
    pub charging_low: f64,
    pub charging_normal_max: f64,
    pub charging_high: f64,
}

impl Default for VoltageThresholds {
    fn default() -> Self {
        Self {
            battery_critical_low: 11.5,
            battery_low: 12.2,
            battery_normal_max: 12.8,
            charging_critical_low: 12.5,
            charging_low: 13.2,
            charging_normal_max: 14.8,
            charging_high: 15.0,
        }
    }
}

/// Result of analyzing one voltage reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltageAlert {
    pub truck_id: String,
    pub voltage: f64,
    pub status: VoltageStatus,
    pub is_engine_running: bool,
    pub priority: AlertLevel,
    pub message: String,
    pub action: Option<String>,
    /// Low/unstable voltage makes other sensor readings suspect
    pub may_affect_sensors: bool,
    pub sensor_warning: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Analyze a voltage reading in context of engine state.
///
/// Returns `None` when no voltage reading is available.
pub fn analyze_voltage(
    truck_id: &str,
    voltage: Option<f64>,
    rpm: Option<f64>,
    timestamp: DateTime<Utc>,
    thresholds: &VoltageThresholds,
) -> Option<VoltageAlert> {
    let voltage = voltage?;
    let is_running = matches!(rpm, Some(r) if r > 100.0);
    Some(if is_running {
        analyze_charging(truck_id, voltage, rpm.unwrap_or(0.0), timestamp, thresholds)
    } else {
        analyze_battery(truck_id, voltage, timestamp, thresholds)
    })
}

fn analyze_battery(
    truck_id: &str,
    voltage: f64,
    timestamp: DateTime<Utc>,
    t: &VoltageThresholds,
) -> VoltageAlert {
    let base = |status, priority, message: String, action: Option<String>, affects: bool, warning: Option<String>| {
        VoltageAlert {
            truck_id: truck_id.to_string(),
            voltage,
            status,
            is_engine_running: false,
            priority,
            message,
            action,
            may_affect_sensors: affects,
            sensor_warning: warning,
            timestamp,
        }
    };

    if voltage < t.battery_critical_low {
        base(
            VoltageStatus::CriticalLow,
            AlertLevel::Critical,
            format!("Batería muerta ({voltage:.1}V) - no va a arrancar"),
            Some("Cargar batería o jump start inmediatamente".to_string()),
            true,
            Some("Voltaje crítico puede causar lecturas erráticas de sensores".to_string()),
        )
    } else if voltage < t.battery_low {
        base(
            VoltageStatus::Low,
            AlertLevel::High,
            format!("Batería baja ({voltage:.1}V) - riesgo de no arranque"),
            Some("Verificar conexiones, considerar carga o reemplazo".to_string()),
            true,
            Some("Voltaje bajo puede afectar precisión de sensores".to_string()),
        )
    } else if voltage <= t.battery_normal_max {
        base(
            VoltageStatus::Normal,
            AlertLevel::Ok,
            format!("Batería OK ({voltage:.1}V)"),
            None,
            false,
            None,
        )
    } else {
        // High voltage with the engine off is a sensor question
        base(
            VoltageStatus::High,
            AlertLevel::Low,
            format!("Voltaje inusual con motor apagado ({voltage:.1}V)"),
            Some("Verificar lectura del sensor".to_string()),
            false,
            None,
        )
    }
}

fn analyze_charging(
    truck_id: &str,
    voltage: f64,
    rpm: f64,
    timestamp: DateTime<Utc>,
    t: &VoltageThresholds,
) -> VoltageAlert {
    let base = |status, priority, message: String, action: Option<String>, affects: bool, warning: Option<String>| {
        VoltageAlert {
            truck_id: truck_id.to_string(),
            voltage,
            status,
            is_engine_running: true,
            priority,
            message,
            action,
            may_affect_sensors: affects,
            sensor_warning: warning,
            timestamp,
        }
    };

    if voltage < t.charging_critical_low {
        base(
            VoltageStatus::CriticalLow,
            AlertLevel::Critical,
            format!("Alternador fallando ({voltage:.1}V con motor a {rpm:.0} RPM)"),
            Some("Detener de forma segura; verificar alternador, correa, conexiones".to_string()),
            true,
            Some("Sistema eléctrico comprometido - lecturas de sensores no confiables".to_string()),
        )
    } else if voltage < t.charging_low {
        base(
            VoltageStatus::Low,
            AlertLevel::High,
            format!("Carga débil ({voltage:.1}V) - alternador no carga bien"),
            Some("Programar revisión de alternador y correa".to_string()),
            true,
            Some("Voltaje marginal puede causar drift en sensores".to_string()),
        )
    } else if voltage <= t.charging_normal_max {
        base(
            VoltageStatus::Normal,
            AlertLevel::Ok,
            format!("Sistema de carga OK ({voltage:.1}V)"),
            None,
            false,
            None,
        )
    } else if voltage <= t.charging_high {
        base(
            VoltageStatus::High,
            AlertLevel::Medium,
            format!("Sobrecarga leve ({voltage:.1}V)"),
            Some("Monitorear; si persiste, revisar regulador de voltaje".to_string()),
            false,
            None,
        )
    } else {
        base(
            VoltageStatus::CriticalHigh,
            AlertLevel::Critical,
            format!("Sobrevoltaje ({voltage:.1}V) - riesgo de daño a electrónicos"),
            Some("Detener y revisar alternador/regulador inmediatamente".to_string()),
            true,
            Some("Sobrevoltaje puede dañar sensores y ECU".to_string()),
        )
    }
}

/// Down-weight sensor trust when the electrical system is unhealthy.
///
/// Returns a 0-1 factor other detectors can multiply into their confidence.
pub fn voltage_quality_factor(voltage: Option<f64>, is_engine_running: bool) -> f64 {
    let Some(v) = voltage else {
        return 1.0;
    };
    let (critical, low) = if is_engine_running {
        (12.5, 13.2)
    } else {
        (11.5, 12.2)
    };
    if v < critical {
        0.5
    } else if v < low {
        0.8
    } else if v > 15.5 {
        0.6
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> VoltageThresholds {
        VoltageThresholds::default()
    }

    #[test]
    fn dead_battery_is_critical() {
        let alert = analyze_voltage("T001", Some(11.0), Some(0.0), Utc::now(), &thresholds())
            .expect("alert");
        assert_eq!(alert.status, VoltageStatus::CriticalLow);
        assert_eq!(alert.priority, AlertLevel::Critical);
        assert!(!alert.is_engine_running);
        assert!(alert.may_affect_sensors);
    }

    #[test]
    fn healthy_battery_is_ok() {
        let alert = analyze_voltage("T001", Some(12.6), None, Utc::now(), &thresholds())
            .expect("alert");
        assert_eq!(alert.status, VoltageStatus::Normal);
        assert_eq!(alert.priority, AlertLevel::Ok);
    }

    #[test]
    fn engine_running_reinterprets_the_same_voltage() {
        // 12.6 V is a healthy battery at rest but a dead alternator at speed
        let at_rest = analyze_voltage("T001", Some(12.6), Some(0.0), Utc::now(), &thresholds())
            .expect("alert");
        assert_eq!(at_rest.priority, AlertLevel::Ok);

        let at_speed =
            analyze_voltage("T001", Some(12.6), Some(1400.0), Utc::now(), &thresholds())
                .expect("alert");
        assert_eq!(at_speed.status, VoltageStatus::Low);
        assert_eq!(at_speed.priority, AlertLevel::High);
    }

    #[test]
    fn alternator_failure_is_critical() {
        let alert = analyze_voltage("T001", Some(12.2), Some(1400.0), Utc::now(), &thresholds())
            .expect("alert");
        assert_eq!(alert.status, VoltageStatus::CriticalLow);
        assert_eq!(alert.priority, AlertLevel::Critical);
        assert!(alert.is_engine_running);
    }

    #[test]
    fn overvoltage_is_critical_high() {
        let alert = analyze_voltage("T001", Some(15.8), Some(1400.0), Utc::now(), &thresholds())
            .expect("alert");
        assert_eq!(alert.status, VoltageStatus::CriticalHigh);
        assert_eq!(alert.priority, AlertLevel::Critical);
    }

    #[test]
    fn mild_overcharge_is_medium() {
        let alert = analyze_voltage("T001", Some(14.9), Some(1400.0), Utc::now(), &thresholds())
            .expect("alert");
        assert_eq!(alert.status, VoltageStatus::High);
        assert_eq!(alert.priority, AlertLevel::Medium);
    }

    #[test]
    fn no_reading_no_alert() {
        assert!(analyze_voltage("T001", None, Some(700.0), Utc::now(), &thresholds()).is_none());
    }

    #[test]
    fn quality_factor_degrades_with_voltage() {
        assert_eq!(voltage_quality_factor(Some(14.0), true), 1.0);
        assert_eq!(voltage_quality_factor(Some(13.0), true), 0.8);
        assert_eq!(voltage_quality_factor(Some(12.0), true), 0.5);
        assert_eq!(voltage_quality_factor(Some(16.0), true), 0.6);
        assert_eq!(voltage_quality_factor(None, true), 1.0);
    }
}
