//! Action-Item Synthesizer
//!
//! Turns every upstream signal — streaming anomalies, failure predictions,
//! correlation events, DTCs, idle-validation failures, voltage alerts,
//! offline trucks, suspicious fuel drops, fleet-wide patterns — into
//! [`ActionItem`] records with a normalized component, icon, category,
//! cost range and action steps from the component table.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::PriorityConfig;
use crate::correlation::{CorrelationEvent, FleetPatternInsight};
use crate::types::{
    ActionItem, Anomaly, CostRange, FailurePrediction, IdleValidationResult, ItemConfidence,
    Priority, Severity, FLEET_TRUCK_ID,
};
use crate::voltage::VoltageAlert;

use super::components::{component_for_sensor, normalize_component, ComponentInfo};
use super::priority::{
    action_type_for, generate_action_id, priority_score, source_weight, PriorityInputs,
};

/// Detector names as they appear in the source hierarchy.
pub mod sources {
    pub const REAL_TIME_PREDICTIVE: &str = "Real-Time Predictive";
    pub const PM_ENGINE: &str = "Predictive Maintenance Engine";
    pub const FAILURE_CORRELATION: &str = "Failure Correlation";
    pub const SENSOR_HEALTH: &str = "Sensor Health";
    pub const DTC_ANALYSIS: &str = "DTC Analysis";
}

/// Build one item from resolved parts. All synthesis paths funnel through
/// here so the metadata attachment stays uniform.
#[allow(clippy::too_many_arguments)]
fn build_item(
    now: DateTime<Utc>,
    truck_id: &str,
    info: &ComponentInfo,
    title: String,
    description: String,
    source: &str,
    days_to_critical: Option<f64>,
    anomaly_score: Option<f64>,
    cost_override: Option<CostRange>,
    current_value: Option<String>,
    trend: Option<String>,
    threshold: Option<String>,
    config: &PriorityConfig,
) -> ActionItem {
    let cost = cost_override.or(info.typical_cost);
    let score = priority_score(
        PriorityInputs {
            days_to_critical,
            anomaly_score,
            criticality: Some(info.criticality),
            cost,
        },
        config,
    );
    let priority = Priority::from_score(score);
    let weight = source_weight(source);
    let confidence = if weight >= 75 {
        ItemConfidence::High
    } else if weight >= 50 {
        ItemConfidence::Medium
    } else {
        ItemConfidence::Low
    };

    ActionItem {
        id: generate_action_id(now),
        truck_id: truck_id.to_string(),
        priority,
        priority_score: score,
        category: info.category,
        component: info.canonical.to_string(),
        title,
        description,
        days_to_critical,
        cost_if_ignored: cost,
        current_value,
        trend,
        threshold,
        confidence,
        action_type: action_type_for(priority, days_to_critical),
        action_steps: info.action_steps.iter().map(|s| (*s).to_string()).collect(),
        icon: info.icon.to_string(),
        sources: vec![source.to_string()],
    }
}

fn severity_score(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 0.95,
        Severity::High => 0.75,
        Severity::Medium => 0.5,
        Severity::Low => 0.25,
    }
}

/// Streaming detector event (C5) → item.
pub fn from_anomaly(
    anomaly: &Anomaly,
    prediction: Option<&FailurePrediction>,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> ActionItem {
    let info = component_for_sensor(anomaly.sensor);
    let days = prediction.and_then(|p| p.days_to_critical);
    build_item(
        now,
        &anomaly.truck_id,
        info,
        format!("{} anomaly on {}", anomaly.sensor, anomaly.truck_id),
        format!(
            "{:?} detector fired on {}: value {:.1} (z={:+.1}, threshold {:.1})",
            anomaly.kind, anomaly.sensor, anomaly.sensor_value, anomaly.z_score, anomaly.threshold
        ),
        sources::REAL_TIME_PREDICTIVE,
        days,
        Some(severity_score(anomaly.severity)),
        None,
        Some(format!("{:.1}", anomaly.sensor_value)),
        prediction.map(|p| format!("{:+.2}/day", p.trend_slope_per_day)),
        Some(format!("{:.1}", anomaly.threshold)),
        config,
    )
}

/// Days-to-failure prediction (C6) → item.
pub fn from_prediction(
    truck_id: &str,
    prediction: &FailurePrediction,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> ActionItem {
    let info = component_for_sensor(prediction.sensor);
    let urgency_score = match prediction.urgency {
        crate::types::PredictionUrgency::Critical => 0.9,
        crate::types::PredictionUrgency::High => 0.7,
        crate::types::PredictionUrgency::Medium => 0.5,
        crate::types::PredictionUrgency::None => 0.2,
    };
    build_item(
        now,
        truck_id,
        info,
        format!("{} trending toward failure", prediction.sensor),
        prediction.recommendation.clone(),
        sources::PM_ENGINE,
        prediction.days_to_critical,
        Some(urgency_score),
        None,
        Some(format!("{:.1}", prediction.current)),
        Some(format!("{:+.2}/day", prediction.trend_slope_per_day)),
        Some(format!("{:.1}", prediction.critical_threshold)),
        config,
    )
}

/// Correlation event (C7) → item. A high-confidence multi-sensor syndrome
/// is an act-now condition; lower confidence gets a week's horizon.
pub fn from_correlation(
    event: &CorrelationEvent,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> ActionItem {
    let info = normalize_component(&event.predicted_component);
    let days = if event.confidence >= 0.8 { 0.5 } else { 7.0 };
    build_item(
        now,
        &event.truck_id,
        info,
        format!("{} pattern on {}", event.pattern_name, event.truck_id),
        format!(
            "{} matched across {} sensors — {}",
            event.pattern_name,
            event.matched_sensors.len(),
            event.recommended_action
        ),
        sources::FAILURE_CORRELATION,
        Some(days),
        Some(event.confidence),
        None,
        None,
        None,
        None,
        config,
    )
}

/// Active DTC list → items, one per recognized code family.
pub fn from_dtcs(
    truck_id: &str,
    dtcs: &[String],
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> Vec<ActionItem> {
    dtcs.iter()
        .map(|code| {
            let (component, desc) = classify_dtc(code);
            let info = normalize_component(component);
            build_item(
                now,
                truck_id,
                info,
                format!("DTC {code} active"),
                format!("{desc} ({code}) reported by the ECU"),
                sources::DTC_ANALYSIS,
                None,
                Some(0.5),
                None,
                None,
                None,
                None,
                config,
            )
        })
        .collect()
}

/// Map a DTC to the component family it implicates.
fn classify_dtc(code: &str) -> (&'static str, &'static str) {
    let upper = code.to_uppercase();
    if upper.starts_with("P07") || upper.starts_with("P08") || upper.starts_with("P09") {
        ("transmission", "Transmission fault code")
    } else if upper.starts_with("P0217") {
        ("cooling", "Engine overtemperature")
    } else if upper.starts_with("P052") || upper.starts_with("P051") {
        ("oil", "Oil pressure circuit fault")
    } else if upper.starts_with("P20") || upper.starts_with("P204") {
        ("def", "Aftertreatment / DEF system fault")
    } else if upper.starts_with("P00") || upper.starts_with("P02") {
        ("fuel", "Fuel and air metering fault")
    } else if upper.starts_with("C") {
        ("brake", "Chassis fault code")
    } else if upper.starts_with("U") {
        ("electrical", "Network communication fault")
    } else {
        ("sensors", "Unclassified fault code")
    }
}

/// Idle validation failure (C3) → data-quality item.
pub fn from_idle_validation(
    result: &IdleValidationResult,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> Option<ActionItem> {
    if !result.needs_investigation {
        return None;
    }
    let info = normalize_component("sensors");
    Some(build_item(
        now,
        &result.truck_id,
        info,
        format!("Idle data disagrees with ECU on {}", result.truck_id),
        format!(
            "Calculated idle {:.1} h/day vs ECU {:.1} h/day ({:+.0}%) — {}",
            result.calculated_daily_hours,
            result.ecu_daily_hours,
            result.deviation_pct,
            result.detail
        ),
        sources::SENSOR_HEALTH,
        None,
        Some((result.deviation_pct.abs() / 100.0).min(1.0)),
        None,
        Some(format!("{:.1} h/day", result.calculated_daily_hours)),
        None,
        Some(format!("{:.1} h/day", result.ecu_daily_hours)),
        config,
    ))
}

/// Voltage alert → electrical item (OK levels produce nothing).
pub fn from_voltage(
    alert: &VoltageAlert,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> Option<ActionItem> {
    use crate::alerts::AlertLevel;
    let anomaly_score = match alert.priority {
        AlertLevel::Critical => 0.95,
        AlertLevel::High => 0.75,
        AlertLevel::Medium => 0.5,
        AlertLevel::Low => 0.25,
        AlertLevel::Ok => return None,
    };
    let info = normalize_component("electrical");
    let days = if alert.priority == AlertLevel::Critical {
        Some(0.5)
    } else {
        None
    };
    Some(build_item(
        now,
        &alert.truck_id,
        info,
        format!("Electrical system issue on {}", alert.truck_id),
        alert.message.clone(),
        sources::SENSOR_HEALTH,
        days,
        Some(anomaly_score),
        None,
        Some(format!("{:.1}V", alert.voltage)),
        None,
        None,
        config,
    ))
}

/// Truck silent past the offline threshold → telemetry item.
pub fn from_offline_truck(
    truck_id: &str,
    hours_offline: f64,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> ActionItem {
    let info = normalize_component("gps");
    build_item(
        now,
        truck_id,
        info,
        format!("{truck_id} offline for {hours_offline:.1} h"),
        format!(
            "No telemetry received from {truck_id} in {hours_offline:.1} hours — check telematics unit and power"
        ),
        sources::SENSOR_HEALTH,
        None,
        Some(0.6),
        None,
        None,
        None,
        None,
        config,
    )
}

/// Unexplained fuel drop while stopped → possible leak or theft.
pub fn from_fuel_drop(
    truck_id: &str,
    drop_pct: f64,
    gallons: f64,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> ActionItem {
    let info = normalize_component("fuel");
    build_item(
        now,
        truck_id,
        info,
        format!("Unexplained fuel drop on {truck_id}"),
        format!(
            "Fuel level fell {drop_pct:.1}% (≈{gallons:.0} gal) while stopped — possible leak or theft"
        ),
        sources::SENSOR_HEALTH,
        None,
        Some(0.8),
        None,
        Some(format!("-{drop_pct:.1}%")),
        None,
        None,
        config,
    )
}

/// Fleet-wide component pattern (C7 batch) → FLEET item.
pub fn from_fleet_pattern(
    insight: &FleetPatternInsight,
    now: DateTime<Utc>,
    config: &PriorityConfig,
) -> ActionItem {
    let info = normalize_component(&insight.component);
    let trucks = insight.truck_ids.join(", ");
    build_item(
        now,
        FLEET_TRUCK_ID,
        info,
        format!(
            "Fleet-wide {} pattern ({} trucks)",
            info.canonical,
            insight.truck_ids.len()
        ),
        format!(
            "{:.0}% of the fleet shows {} failures ({trucks}) — investigate a common cause",
            insight.fleet_fraction * 100.0,
            info.canonical
        ),
        sources::FAILURE_CORRELATION,
        None,
        Some(insight.fleet_fraction.min(1.0)),
        None,
        None,
        None,
        None,
        config,
    )
}

/// Parse a cost figure arriving as a display string (e.g. `"$8,000 – $15,000"`,
/// `"$5k"`, `"1200"`). Numeric-vs-string drift from upstream sources is
/// resolved here, on ingress.
pub fn parse_cost(raw: &str) -> Option<CostRange> {
    static COST_RE: OnceLock<Regex> = OnceLock::new();
    let re = COST_RE.get_or_init(|| {
        Regex::new(r"\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([kK])?").unwrap_or_else(|_| {
            // The pattern is a literal; a failure here is a programmer error
            // surfaced at first use in tests.
            Regex::new(r"$^").expect("fallback regex")
        })
    });

    let mut values = Vec::new();
    for capture in re.captures_iter(raw) {
        let number = capture.get(1)?.as_str().replace(',', "");
        let mut value: f64 = number.parse().ok()?;
        if capture.get(2).is_some() {
            value *= 1_000.0;
        }
        values.push(value);
        if values.len() == 2 {
            break;
        }
    }
    match values.as_slice() {
        [single] => Some(CostRange::new(*single, *single)),
        [min, max] => Some(CostRange::new(min.min(*max), min.max(*max))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, AnomalyKind, SensorId};

    fn config() -> PriorityConfig {
        PriorityConfig::default()
    }

    #[test]
    fn correlation_critical_becomes_stop_immediately() {
        let event = CorrelationEvent {
            truck_id: "T001".to_string(),
            timestamp: Utc::now(),
            pattern_name: "overheating_syndrome".to_string(),
            predicted_component: "cooling_system".to_string(),
            recommended_action: "Stop safely".to_string(),
            confidence: 0.9,
            matched_sensors: vec![SensorId::CoolantTemp, SensorId::OilTemp, SensorId::TransTemp],
        };
        let item = from_correlation(&event, Utc::now(), &config());

        assert_eq!(item.component, "cooling_system");
        assert_eq!(item.priority, Priority::Critical);
        assert_eq!(item.action_type, ActionType::StopImmediately);
        assert_eq!(item.sources, vec![sources::FAILURE_CORRELATION.to_string()]);
        assert_eq!(item.confidence, ItemConfidence::High);
    }

    #[test]
    fn anomaly_item_carries_display_strings() {
        let anomaly = Anomaly {
            truck_id: "T001".to_string(),
            sensor: SensorId::CoolantTemp,
            timestamp: Utc::now(),
            kind: AnomalyKind::Cusum,
            severity: Severity::High,
            sensor_value: 241.3,
            ewma_value: 238.0,
            cusum_value: 6.1,
            threshold: 5.0,
            z_score: 2.4,
        };
        let item = from_anomaly(&anomaly, None, Utc::now(), &config());
        assert_eq!(item.component, "cooling_system");
        assert_eq!(item.current_value.as_deref(), Some("241.3"));
        assert!(item.id.starts_with("ACT-"));
        assert!(!item.action_steps.is_empty());
    }

    #[test]
    fn dtc_codes_map_to_components() {
        let items = from_dtcs(
            "T001",
            &["P0741".to_string(), "P20EE".to_string(), "U0100".to_string()],
            Utc::now(),
            &config(),
        );
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].component, "transmission");
        assert_eq!(items[1].component, "def_system");
        assert_eq!(items[2].component, "electrical_system");
        for item in &items {
            assert_eq!(item.confidence, ItemConfidence::Medium);
        }
    }

    #[test]
    fn idle_validation_only_items_failures() {
        let ok = IdleValidationResult {
            truck_id: "T001".to_string(),
            is_valid: true,
            needs_investigation: false,
            deviation_pct: 5.0,
            calculated_daily_hours: 6.0,
            ecu_daily_hours: 5.7,
            confidence: crate::types::IdleConfidence::High,
            detail: String::new(),
        };
        assert!(from_idle_validation(&ok, Utc::now(), &config()).is_none());

        let bad = IdleValidationResult {
            needs_investigation: true,
            is_valid: false,
            deviation_pct: 300.0,
            calculated_daily_hours: 12.0,
            ecu_daily_hours: 3.0,
            ..ok
        };
        let item = from_idle_validation(&bad, Utc::now(), &config()).expect("item");
        assert_eq!(item.component, "sensors");
    }

    #[test]
    fn fleet_pattern_items_use_the_fleet_truck_id() {
        let insight = FleetPatternInsight {
            component: "transmission".to_string(),
            truck_ids: vec!["T001".to_string(), "T002".to_string(), "T003".to_string()],
            fleet_fraction: 0.3,
        };
        let item = from_fleet_pattern(&insight, Utc::now(), &config());
        assert_eq!(item.truck_id, FLEET_TRUCK_ID);
        assert_eq!(item.component, "transmission");
    }

    #[test]
    fn cost_parsing_handles_the_drifting_formats() {
        assert_eq!(
            parse_cost("$8,000 – $15,000"),
            Some(CostRange::new(8_000.0, 15_000.0))
        );
        assert_eq!(parse_cost("$5k"), Some(CostRange::new(5_000.0, 5_000.0)));
        assert_eq!(parse_cost("1200"), Some(CostRange::new(1_200.0, 1_200.0)));
        assert_eq!(
            parse_cost("500 - 2k"),
            Some(CostRange::new(500.0, 2_000.0))
        );
        assert_eq!(parse_cost("no digits here"), None);
    }
}
