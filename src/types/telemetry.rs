//! Telemetry sample types
//!
//! One validated observation for one truck at one UTC instant. All sensor
//! channels are nullable: validation nulls individual out-of-range fields
//! instead of rejecting the sample wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operational status reported by the ingestion adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruckStatus {
    Moving,
    #[default]
    Stopped,
    Offline,
}

impl std::fmt::Display for TruckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TruckStatus::Moving => write!(f, "MOVING"),
            TruckStatus::Stopped => write!(f, "STOPPED"),
            TruckStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// One telemetry observation for one truck.
///
/// Cumulative ECU counters (`engine_hours`, `idle_hours`, `total_idle_fuel_gal`,
/// `total_fuel_added_gal`) are monotonic non-decreasing when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub truck_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: TruckStatus,

    // === Engine ===
    /// Engine RPM (0 = engine off, None = unknown)
    pub rpm: Option<f64>,
    /// Road speed (mph)
    pub speed_mph: Option<f64>,

    // === Fuel ===
    /// Fuel level as percent of tank capacity
    pub fuel_pct: Option<f64>,
    /// Fuel level in liters
    pub fuel_liters: Option<f64>,
    /// Instantaneous fuel rate (liters per hour)
    pub fuel_rate_lph: Option<f64>,

    // === Odometer / cumulative ECU counters ===
    /// Odometer (miles)
    pub odometer_mi: Option<f64>,
    /// Cumulative engine hours
    pub engine_hours: Option<f64>,
    /// Cumulative idle hours
    pub idle_hours: Option<f64>,
    /// Cumulative idle fuel burned (gallons)
    pub total_idle_fuel_gal: Option<f64>,
    /// Cumulative fuel added (gallons) — corroborates refuel detection
    pub total_fuel_added_gal: Option<f64>,

    // === Environment / electrical ===
    /// Ambient temperature (°F)
    pub ambient_temp_f: Option<f64>,
    /// Battery / charging system voltage (pwr_int)
    pub battery_voltage: Option<f64>,

    // === Powertrain sensors ===
    /// Coolant temperature (°F)
    pub coolant_temp_f: Option<f64>,
    /// Engine oil pressure (psi)
    pub oil_pressure_psi: Option<f64>,
    /// Engine oil temperature (°F)
    pub oil_temp_f: Option<f64>,
    /// Transmission temperature (°F)
    pub trans_temp_f: Option<f64>,
    /// DEF tank level (percent)
    pub def_level_pct: Option<f64>,
    /// Turbo boost pressure (psi)
    pub boost_pressure_psi: Option<f64>,

    // === GPS ===
    /// GPS fix quality 0-100
    pub gps_quality: Option<f64>,
    /// Satellites in view
    pub satellites: Option<u32>,

    // === Faults ===
    /// Active diagnostic trouble codes
    #[serde(default)]
    pub active_dtcs: Vec<String>,

    /// Sensors the adapter reported that the core does not model.
    /// Kept for persistence only; never drives control flow.
    #[serde(default)]
    pub extra_sensors: BTreeMap<String, f64>,
}

impl TelemetrySample {
    /// Minimal sample for construction in tests and adapters.
    pub fn new(truck_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            truck_id: truck_id.into(),
            timestamp,
            status: TruckStatus::Stopped,
            rpm: None,
            speed_mph: None,
            fuel_pct: None,
            fuel_liters: None,
            fuel_rate_lph: None,
            odometer_mi: None,
            engine_hours: None,
            idle_hours: None,
            total_idle_fuel_gal: None,
            total_fuel_added_gal: None,
            ambient_temp_f: None,
            battery_voltage: None,
            coolant_temp_f: None,
            oil_pressure_psi: None,
            oil_temp_f: None,
            trans_temp_f: None,
            def_level_pct: None,
            boost_pressure_psi: None,
            gps_quality: None,
            satellites: None,
            active_dtcs: Vec::new(),
            extra_sensors: BTreeMap::new(),
        }
    }

    /// True if the engine is reported running (RPM above cranking).
    pub fn is_engine_running(&self) -> bool {
        matches!(self.rpm, Some(r) if r > 100.0)
    }

    /// True if at least one fuel level reading is present.
    pub fn has_fuel_level(&self) -> bool {
        self.fuel_pct.is_some() || self.fuel_liters.is_some()
    }
}

/// The fixed set of sensors under streaming supervision.
///
/// Unknown sensor names from the adapter land in
/// [`TelemetrySample::extra_sensors`] and are never promoted to this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorId {
    CoolantTemp,
    OilPressure,
    OilTemp,
    TransTemp,
    BatteryVoltage,
    DefLevel,
    FuelPct,
    FuelRate,
    AmbientTemp,
    BoostPressure,
    Rpm,
}

impl SensorId {
    /// All sensors the streaming engine supervises, in a stable order.
    pub const ALL: [SensorId; 11] = [
        SensorId::CoolantTemp,
        SensorId::OilPressure,
        SensorId::OilTemp,
        SensorId::TransTemp,
        SensorId::BatteryVoltage,
        SensorId::DefLevel,
        SensorId::FuelPct,
        SensorId::FuelRate,
        SensorId::AmbientTemp,
        SensorId::BoostPressure,
        SensorId::Rpm,
    ];

    /// Canonical wire name, used as part of persistence keys.
    pub fn as_str(self) -> &'static str {
        match self {
            SensorId::CoolantTemp => "coolant_temp",
            SensorId::OilPressure => "oil_pressure",
            SensorId::OilTemp => "oil_temp",
            SensorId::TransTemp => "trans_temp",
            SensorId::BatteryVoltage => "battery_voltage",
            SensorId::DefLevel => "def_level",
            SensorId::FuelPct => "fuel_pct",
            SensorId::FuelRate => "fuel_rate",
            SensorId::AmbientTemp => "ambient_temp",
            SensorId::BoostPressure => "boost_pressure",
            SensorId::Rpm => "rpm",
        }
    }

    /// Parse a canonical wire name back into a sensor id.
    pub fn parse(name: &str) -> Option<SensorId> {
        SensorId::ALL.iter().copied().find(|s| s.as_str() == name)
    }

    /// Read this sensor's value out of a sample, if present.
    pub fn value_of(self, sample: &TelemetrySample) -> Option<f64> {
        match self {
            SensorId::CoolantTemp => sample.coolant_temp_f,
            SensorId::OilPressure => sample.oil_pressure_psi,
            SensorId::OilTemp => sample.oil_temp_f,
            SensorId::TransTemp => sample.trans_temp_f,
            SensorId::BatteryVoltage => sample.battery_voltage,
            SensorId::DefLevel => sample.def_level_pct,
            SensorId::FuelPct => sample.fuel_pct,
            SensorId::FuelRate => sample.fuel_rate_lph,
            SensorId::AmbientTemp => sample.ambient_temp_f,
            SensorId::BoostPressure => sample.boost_pressure_psi,
            SensorId::Rpm => sample.rpm,
        }
    }

    /// Null this sensor's field on a sample (range-validation failure).
    pub fn clear_on(self, sample: &mut TelemetrySample) {
        match self {
            SensorId::CoolantTemp => sample.coolant_temp_f = None,
            SensorId::OilPressure => sample.oil_pressure_psi = None,
            SensorId::OilTemp => sample.oil_temp_f = None,
            SensorId::TransTemp => sample.trans_temp_f = None,
            SensorId::BatteryVoltage => sample.battery_voltage = None,
            SensorId::DefLevel => sample.def_level_pct = None,
            SensorId::FuelPct => sample.fuel_pct = None,
            SensorId::FuelRate => sample.fuel_rate_lph = None,
            SensorId::AmbientTemp => sample.ambient_temp_f = None,
            SensorId::BoostPressure => sample.boost_pressure_psi = None,
            SensorId::Rpm => sample.rpm = None,
        }
    }
}

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static truck attributes of operational interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckProfile {
    pub truck_id: String,
    /// Tank capacity in liters
    pub tank_capacity_l: f64,
    /// Configured MPG baseline, if the operator set one
    pub mpg_baseline: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl TruckProfile {
    pub fn new(truck_id: impl Into<String>, tank_capacity_l: f64) -> Self {
        Self {
            truck_id: truck_id.into(),
            tank_capacity_l,
            mpg_baseline: None,
            last_seen: None,
        }
    }

    /// Tank capacity in gallons.
    pub fn tank_capacity_gal(&self) -> f64 {
        self.tank_capacity_l / crate::LITERS_PER_GALLON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_id_roundtrip() {
        for sensor in SensorId::ALL {
            assert_eq!(SensorId::parse(sensor.as_str()), Some(sensor));
        }
        assert_eq!(SensorId::parse("made_up_sensor"), None);
    }

    #[test]
    fn clear_on_nulls_only_the_target_field() {
        let mut sample = TelemetrySample::new("T001", Utc::now());
        sample.coolant_temp_f = Some(200.0);
        sample.oil_pressure_psi = Some(45.0);

        SensorId::CoolantTemp.clear_on(&mut sample);

        assert_eq!(sample.coolant_temp_f, None);
        assert_eq!(sample.oil_pressure_psi, Some(45.0));
    }

    #[test]
    fn engine_running_requires_rpm_above_cranking() {
        let mut sample = TelemetrySample::new("T001", Utc::now());
        assert!(!sample.is_engine_running());
        sample.rpm = Some(90.0);
        assert!(!sample.is_engine_running());
        sample.rpm = Some(650.0);
        assert!(sample.is_engine_running());
    }
}
