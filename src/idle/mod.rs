//! Idle Estimator — hybrid idle consumption calculation
//!
//! Derives idle GPH for a stopped truck from the best evidence available,
//! falling through a fixed priority ladder:
//!
//! 1. `ECU_IDLE_COUNTER` — cumulative ECU idle-fuel delta (±0.1%)
//! 2. `ENGINE_OFF` — RPM explicitly 0 with no valid fuel-rate reading
//! 3. `SENSOR_FUEL_RATE` — direct fuel-rate sensor (±2-5%), EMA smoothed
//! 4. `CALCULATED_DELTA` — fuel-level delta over a sufficient window (±5-10%)
//! 5. `RPM_ESTIMATE` — linear RPM approximation
//! 6. `FALLBACK_CONSENSUS` — conservative flat estimate
//!
//! HVAC load scales the estimate-based methods: heating below the comfort
//! band and AC above it both burn extra fuel at idle.

mod validation;

pub use validation::validate_against_ecu;

use tracing::debug;

use crate::config::IdleConfig;
use crate::types::{ClimateZone, HvacImpact, IdleMethod, IdleMode, IdleReading, TruckStatus};
use crate::LITERS_PER_GALLON;

/// Inputs the estimator needs beyond the current sample's own fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleContext {
    /// Previous fuel level in liters
    pub previous_fuel_l: Option<f64>,
    /// Previous cumulative ECU idle-fuel counter (gallons)
    pub previous_total_idle_fuel: Option<f64>,
    /// Previous idle GPH reading, for EMA smoothing
    pub previous_idle_gph: Option<f64>,
    /// Time since the previous sample (hours)
    pub time_delta_hours: f64,
}

/// HVAC adjustment factor for an ambient temperature.
pub fn temperature_factor(temperature_f: Option<f64>, config: &IdleConfig) -> (f64, ClimateZone) {
    let Some(t) = temperature_f else {
        return (1.0, ClimateZone::NoTempData);
    };
    if t < config.temp_extreme_cold_f {
        (config.temp_extreme_cold_multiplier, ClimateZone::ExtremeCold)
    } else if t < config.temp_comfort_low_f {
        (config.temp_cold_multiplier, ClimateZone::Cold)
    } else if t <= config.temp_comfort_high_f {
        (1.0, ClimateZone::ComfortZone)
    } else if t < config.temp_extreme_hot_f {
        (config.temp_hot_multiplier, ClimateZone::Hot)
    } else {
        (config.temp_extreme_hot_multiplier, ClimateZone::ExtremeHot)
    }
}

/// Classify idle mode from GPH.
pub fn detect_idle_mode(idle_gph: f64, config: &IdleConfig) -> IdleMode {
    if idle_gph <= 0.0 {
        IdleMode::EngineOff
    } else if idle_gph <= config.normal_max_gph {
        IdleMode::Normal
    } else if idle_gph <= config.reefer_max_gph {
        IdleMode::Reefer
    } else {
        IdleMode::Heavy
    }
}

/// Derive the idle reading for one sample.
#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
pub fn calculate_idle(
    truck_id: &str,
    status: TruckStatus,
    rpm: Option<f64>,
    fuel_rate_lph: Option<f64>,
    current_fuel_l: Option<f64>,
    temperature_f: Option<f64>,
    total_idle_fuel: Option<f64>,
    ctx: IdleContext,
    config: &IdleConfig,
) -> IdleReading {
    if status != TruckStatus::Stopped {
        return IdleReading::not_idle();
    }

    let (temp_factor, climate_zone) = temperature_factor(temperature_f, config);
    let reading = |gph: f64, method: IdleMethod| IdleReading {
        idle_gph: gph,
        method,
        mode: detect_idle_mode(gph, config),
        temperature_factor: temp_factor,
        climate_zone,
    };

    // METHOD 0: ECU idle-fuel counter (most accurate)
    if let (Some(current), Some(previous)) = (total_idle_fuel, ctx.previous_total_idle_fuel) {
        if ctx.time_delta_hours > 0.01 {
            let delta = current - previous;
            if delta > 0.0 && delta < 5.0 {
                let gph = delta / ctx.time_delta_hours;
                if (0.1..=5.0).contains(&gph) {
                    debug!(
                        truck_id,
                        gph,
                        delta,
                        minutes = ctx.time_delta_hours * 60.0,
                        "Idle via ECU counter"
                    );
                    return reading(gph, IdleMethod::EcuIdleCounter);
                }
                debug!(truck_id, gph, "ECU counter rate out of sane range");
            } else if delta < 0.0 {
                debug!(truck_id, previous, current, "ECU idle counter went backwards");
            }
        }
    }

    let has_valid_fuel_rate = matches!(
        fuel_rate_lph,
        Some(rate) if (config.fuel_rate_min_lph..=config.fuel_rate_max_lph).contains(&rate)
    );

    // Engine off only when RPM is explicitly 0 and the fuel-rate sensor
    // is silent. Some trucks report RPM=0 while burning measurable fuel.
    if rpm == Some(0.0) && !has_valid_fuel_rate {
        return reading(0.0, IdleMethod::EngineOff);
    }

    // METHOD 1: fuel-rate sensor
    if has_valid_fuel_rate {
        if let Some(rate) = fuel_rate_lph {
            let raw_gph = rate / LITERS_PER_GALLON;
            // EMA against the previous reading smooths sensor jitter
            let gph = match ctx.previous_idle_gph {
                Some(prev) if prev > 0.0 => {
                    config.ema_alpha * raw_gph + (1.0 - config.ema_alpha) * prev
                }
                _ => raw_gph,
            };
            debug!(truck_id, gph, fuel_rate_lph = rate, "Idle via fuel-rate sensor");
            return reading(gph, IdleMethod::SensorFuelRate);
        }
    }

    // METHOD 2: fuel-level delta over a sufficient window
    if let (Some(current), Some(previous)) = (current_fuel_l, ctx.previous_fuel_l) {
        if ctx.time_delta_hours >= config.delta_min_time_hours {
            let consumed_l = previous - current;
            if consumed_l > 0.0 {
                let lph = consumed_l / ctx.time_delta_hours;
                if (config.delta_min_lph..=config.delta_max_lph).contains(&lph) {
                    let gph = lph / LITERS_PER_GALLON;
                    debug!(
                        truck_id,
                        gph,
                        consumed_l,
                        minutes = ctx.time_delta_hours * 60.0,
                        "Idle via calculated delta"
                    );
                    return reading(gph, IdleMethod::CalculatedDelta);
                }
                debug!(truck_id, lph, "Calculated delta out of range");
            }
        }
    }

    // METHOD 3: RPM approximation — accounts for actual engine load.
    // At 600 RPM: 0.42 GPH; at 1000 RPM: 0.50; at 1500 (PTO): 0.60.
    if let Some(r) = rpm {
        if r > 0.0 {
            let gph = (0.3 + (r / 1000.0) * 0.2) * temp_factor;
            debug!(truck_id, gph, rpm = r, "Idle via RPM estimate");
            return reading(gph, IdleMethod::RpmEstimate);
        }
    }

    // METHOD 4: conservative fallback
    let gph = config.fallback_gph * temp_factor;
    debug!(truck_id, gph, "Idle via fallback consensus");
    reading(gph, IdleMethod::FallbackConsensus)
}

/// Cost of idle time at the configured fuel price.
pub fn idle_cost(idle_gph: f64, idle_hours: f64, fuel_price_per_gallon: f64) -> f64 {
    if idle_gph <= 0.0 || idle_hours <= 0.0 {
        return 0.0;
    }
    idle_gph * idle_hours * fuel_price_per_gallon
}

/// Estimate the extra fuel HVAC burns for a given climate and idle duration.
pub fn estimate_hvac_impact(
    temperature_f: Option<f64>,
    idle_hours: f64,
    base_gph: f64,
    config: &IdleConfig,
) -> HvacImpact {
    let (factor, climate_zone) = temperature_factor(temperature_f, config);
    let base_gallons = base_gph * idle_hours;
    let adjusted_gallons = base_gallons * factor;
    HvacImpact {
        temperature_f,
        base_gallons,
        adjusted_gallons,
        hvac_impact_gallons: adjusted_gallons - base_gallons,
        hvac_impact_pct: (factor - 1.0) * 100.0,
        climate_zone,
    }
}
