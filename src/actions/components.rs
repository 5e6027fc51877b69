//! Component normalization and metadata tables
//!
//! Every synthesis path funnels through [`normalize_component`] so that the
//! deduplicator sees one canonical name per physical system regardless of
//! which detector produced the signal. The metadata table carries category,
//! criticality weight, icon, typical repair cost and the operator checklist.

use crate::types::{Category, CostRange};

/// Canonical metadata for one vehicle system.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub canonical: &'static str,
    pub category: Category,
    /// Criticality weight, 0.8 (GPS) .. 3.0 (transmission)
    pub criticality: f64,
    pub icon: &'static str,
    pub typical_cost: Option<CostRange>,
    pub action_steps: &'static [&'static str],
}

/// Highest criticality in the table; used to scale the priority sub-signal.
pub const MAX_CRITICALITY: f64 = 3.0;

const COMPONENTS: &[ComponentInfo] = &[
    ComponentInfo {
        canonical: "transmission",
        category: Category::Transmission,
        criticality: 3.0,
        icon: "⚙️",
        typical_cost: Some(CostRange {
            min: 15_000.0,
            max: 30_000.0,
            avg: 22_500.0,
        }),
        action_steps: &[
            "Check transmission fluid level and color",
            "Scan for transmission temperature history",
            "Schedule transmission service bay inspection",
        ],
    },
    ComponentInfo {
        canonical: "oil_system",
        category: Category::Engine,
        criticality: 2.8,
        icon: "🛢️",
        typical_cost: Some(CostRange {
            min: 8_000.0,
            max: 15_000.0,
            avg: 11_500.0,
        }),
        action_steps: &[
            "Verify oil level and pressure at idle",
            "Inspect for leaks around filter and pan",
            "Send oil sample for analysis",
        ],
    },
    ComponentInfo {
        canonical: "cooling_system",
        category: Category::Engine,
        criticality: 2.6,
        icon: "🌡️",
        typical_cost: Some(CostRange {
            min: 3_000.0,
            max: 8_000.0,
            avg: 5_500.0,
        }),
        action_steps: &[
            "Check coolant level and condition",
            "Inspect radiator, fan clutch and hoses",
            "Pressure-test the cooling system",
        ],
    },
    ComponentInfo {
        canonical: "brakes",
        category: Category::Brakes,
        criticality: 2.5,
        icon: "🛑",
        typical_cost: Some(CostRange {
            min: 2_000.0,
            max: 6_000.0,
            avg: 4_000.0,
        }),
        action_steps: &[
            "Measure lining thickness at all positions",
            "Check air system for leaks",
            "Verify slack adjuster stroke",
        ],
    },
    ComponentInfo {
        canonical: "turbocharger",
        category: Category::Turbo,
        criticality: 2.2,
        icon: "🌀",
        typical_cost: Some(CostRange {
            min: 4_000.0,
            max: 9_000.0,
            avg: 6_500.0,
        }),
        action_steps: &[
            "Inspect wastegate actuator and linkage",
            "Check charge-air cooler and piping for leaks",
            "Listen for shaft play at idle",
        ],
    },
    ComponentInfo {
        canonical: "def_system",
        category: Category::Def,
        criticality: 2.0,
        icon: "💧",
        typical_cost: Some(CostRange {
            min: 2_000.0,
            max: 5_000.0,
            avg: 3_500.0,
        }),
        action_steps: &[
            "Refill DEF tank with certified fluid",
            "Check DEF quality sensor readings",
            "Clear derate history after refill",
        ],
    },
    ComponentInfo {
        canonical: "electrical_system",
        category: Category::Electrical,
        criticality: 1.8,
        icon: "🔋",
        typical_cost: Some(CostRange {
            min: 500.0,
            max: 2_000.0,
            avg: 1_250.0,
        }),
        action_steps: &[
            "Load-test batteries",
            "Measure alternator output at rated RPM",
            "Clean and torque ground connections",
        ],
    },
    ComponentInfo {
        canonical: "fuel_system",
        category: Category::Fuel,
        criticality: 1.5,
        icon: "⛽",
        typical_cost: Some(CostRange {
            min: 1_000.0,
            max: 4_000.0,
            avg: 2_500.0,
        }),
        action_steps: &[
            "Inspect fuel lines and tank for leaks",
            "Replace primary and secondary filters",
            "Verify fuel sender calibration",
        ],
    },
    ComponentInfo {
        canonical: "driver_behavior",
        category: Category::Driver,
        criticality: 1.2,
        icon: "🚚",
        typical_cost: None,
        action_steps: &[
            "Review idle and speed events with driver",
            "Schedule coaching session",
        ],
    },
    ComponentInfo {
        canonical: "sensors",
        category: Category::Sensor,
        criticality: 1.0,
        icon: "📡",
        typical_cost: Some(CostRange {
            min: 200.0,
            max: 800.0,
            avg: 500.0,
        }),
        action_steps: &[
            "Cross-check reading against a reference gauge",
            "Inspect wiring and connector for corrosion",
            "Replace sensor if drift persists",
        ],
    },
    ComponentInfo {
        canonical: "efficiency",
        category: Category::Efficiency,
        criticality: 0.9,
        icon: "📉",
        typical_cost: None,
        action_steps: &[
            "Compare MPG against fleet baseline",
            "Check tire pressure and alignment",
            "Review route and load profile",
        ],
    },
    ComponentInfo {
        canonical: "gps_receiver",
        category: Category::Gps,
        criticality: 0.8,
        icon: "🛰️",
        typical_cost: Some(CostRange {
            min: 150.0,
            max: 500.0,
            avg: 325.0,
        }),
        action_steps: &[
            "Check antenna mounting and cable",
            "Power-cycle the telematics unit",
        ],
    },
];

/// Look up metadata for a canonical component name.
pub fn component_info(canonical: &str) -> Option<&'static ComponentInfo> {
    COMPONENTS.iter().find(|c| c.canonical == canonical)
}

/// Map a raw component/system mention from any detector to its canonical
/// name. Unknown strings fall back to `sensors` — a signal we cannot
/// attribute to a physical system is a sensor-quality question first.
pub fn normalize_component(raw: &str) -> &'static ComponentInfo {
    let lower = raw.to_lowercase();
    let canonical = if lower.contains("trans") {
        "transmission"
    } else if lower.contains("oil") {
        "oil_system"
    } else if lower.contains("cool") || lower.contains("coolant") || lower.contains("radiator") {
        "cooling_system"
    } else if lower.contains("brake") {
        "brakes"
    } else if lower.contains("turbo") || lower.contains("boost") {
        "turbocharger"
    } else if lower.contains("def") {
        "def_system"
    } else if lower.contains("batter")
        || lower.contains("alternator")
        || lower.contains("voltage")
        || lower.contains("electric")
    {
        "electrical_system"
    } else if lower.contains("fuel") {
        "fuel_system"
    } else if lower.contains("driver") {
        "driver_behavior"
    } else if lower.contains("gps") || lower.contains("satellite") {
        "gps_receiver"
    } else if lower.contains("mpg") || lower.contains("efficien") {
        "efficiency"
    } else {
        "sensors"
    };
    component_info(canonical).unwrap_or(&COMPONENTS[COMPONENTS.len() - 1])
}

/// Canonical component for a supervised sensor.
pub fn component_for_sensor(sensor: crate::types::SensorId) -> &'static ComponentInfo {
    use crate::types::SensorId;
    let canonical = match sensor {
        SensorId::CoolantTemp => "cooling_system",
        SensorId::OilPressure | SensorId::OilTemp => "oil_system",
        SensorId::TransTemp => "transmission",
        SensorId::BatteryVoltage => "electrical_system",
        SensorId::DefLevel => "def_system",
        SensorId::FuelPct | SensorId::FuelRate => "fuel_system",
        SensorId::BoostPressure => "turbocharger",
        SensorId::AmbientTemp | SensorId::Rpm => "sensors",
    };
    component_info(canonical).unwrap_or(&COMPONENTS[COMPONENTS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize_to_canonical_names() {
        assert_eq!(normalize_component("Transmission Overheat").canonical, "transmission");
        assert_eq!(normalize_component("oil pressure").canonical, "oil_system");
        assert_eq!(normalize_component("COOLING SYSTEM").canonical, "cooling_system");
        assert_eq!(normalize_component("battery voltage").canonical, "electrical_system");
        assert_eq!(normalize_component("low DEF").canonical, "def_system");
        assert_eq!(normalize_component("gps antenna").canonical, "gps_receiver");
        assert_eq!(normalize_component("mystery widget").canonical, "sensors");
    }

    #[test]
    fn criticality_spans_the_documented_range() {
        assert_eq!(component_info("transmission").map(|c| c.criticality), Some(3.0));
        assert_eq!(component_info("gps_receiver").map(|c| c.criticality), Some(0.8));
        for c in COMPONENTS {
            assert!((0.8..=MAX_CRITICALITY).contains(&c.criticality), "{}", c.canonical);
        }
    }

    #[test]
    fn every_component_has_steps() {
        for c in COMPONENTS {
            assert!(!c.action_steps.is_empty(), "{}", c.canonical);
        }
    }
}
