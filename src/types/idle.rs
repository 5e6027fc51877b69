//! Idle consumption types

use serde::{Deserialize, Serialize};

/// How the idle GPH figure was derived, in decreasing order of accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdleMethod {
    NotIdle,
    EngineOff,
    /// ECU cumulative idle-fuel counter delta (±0.1%)
    EcuIdleCounter,
    /// Direct fuel-rate sensor reading (±2-5%)
    SensorFuelRate,
    /// Fuel level delta over a sufficient window (±5-10%)
    CalculatedDelta,
    /// Linear RPM approximation
    RpmEstimate,
    /// Conservative flat estimate
    FallbackConsensus,
}

/// Idle mode classification from GPH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdleMode {
    EngineOff,
    /// 0-1.2 gph
    Normal,
    /// 1.2-2.5 gph — refrigerated trailer load
    Reefer,
    /// >2.5 gph
    Heavy,
}

/// Climate zone driving the HVAC adjustment factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClimateZone {
    ExtremeCold,
    Cold,
    ComfortZone,
    Hot,
    ExtremeHot,
    NoTempData,
}

/// Derived idle reading for one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleReading {
    /// Idle consumption in gallons per hour (0 when not idle)
    pub idle_gph: f64,
    pub method: IdleMethod,
    pub mode: IdleMode,
    /// HVAC multiplier applied to estimate-based methods
    pub temperature_factor: f64,
    pub climate_zone: ClimateZone,
}

impl IdleReading {
    pub fn not_idle() -> Self {
        Self {
            idle_gph: 0.0,
            method: IdleMethod::NotIdle,
            mode: IdleMode::EngineOff,
            temperature_factor: 1.0,
            climate_zone: ClimateZone::NoTempData,
        }
    }

    /// Methods backed by a physical measurement rather than an estimate.
    pub fn is_reliable(&self) -> bool {
        matches!(
            self.method,
            IdleMethod::EcuIdleCounter | IdleMethod::SensorFuelRate | IdleMethod::CalculatedDelta
        )
    }
}

/// Confidence attached to idle validation against ECU counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdleConfidence {
    Low,
    Medium,
    High,
}

/// Result of cross-checking calculated idle hours against ECU counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleValidationResult {
    pub truck_id: String,
    pub is_valid: bool,
    pub needs_investigation: bool,
    /// Signed deviation between calculated and ECU-implied daily idle hours (%)
    pub deviation_pct: f64,
    pub calculated_daily_hours: f64,
    pub ecu_daily_hours: f64,
    pub confidence: IdleConfidence,
    pub detail: String,
}

/// HVAC impact on idle fuel for a given climate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvacImpact {
    pub temperature_f: Option<f64>,
    pub base_gallons: f64,
    pub adjusted_gallons: f64,
    pub hvac_impact_gallons: f64,
    pub hvac_impact_pct: f64,
    pub climate_zone: ClimateZone,
}
