//! Failure-Correlation Engine
//!
//! Configuration-driven matching of multi-sensor failure patterns. A pattern
//! fires only when its primary predicate holds persistently and no predicate
//! with data contradicts it; confidence scales with the fraction of
//! correlated sensors actually corroborating.
//!
//! The batch sweep surfaces fleet-wide syndromes: the same component failing
//! on a large enough share of trucks is a systemic problem, not a truck
//! problem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::{CorrelationConfig, FailurePattern};
use crate::telemetry::SensorHub;
use crate::types::SensorId;

/// A matched failure pattern for one truck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationEvent {
    pub truck_id: String,
    pub timestamp: DateTime<Utc>,
    pub pattern_name: String,
    pub predicted_component: String,
    pub recommended_action: String,
    /// Pattern confidence × fraction of corroborating sensors
    pub confidence: f64,
    pub matched_sensors: Vec<SensorId>,
}

/// A component failing across a meaningful share of the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetPatternInsight {
    pub component: String,
    pub truck_ids: Vec<String>,
    /// Affected trucks / observed trucks
    pub fleet_fraction: f64,
}

/// Evaluate every configured pattern against one truck's sensor buffers.
pub fn check_patterns(
    hub: &SensorHub,
    timestamp: DateTime<Utc>,
    config: &CorrelationConfig,
) -> Vec<CorrelationEvent> {
    config
        .patterns
        .iter()
        .filter_map(|pattern| check_pattern(hub, timestamp, pattern))
        .collect()
}

fn check_pattern(
    hub: &SensorHub,
    timestamp: DateTime<Utc>,
    pattern: &FailurePattern,
) -> Option<CorrelationEvent> {
    let mut matched = Vec::new();

    for predicate in &pattern.predicates {
        let (hit, inspected) = hub.has_persistent_critical_reading(
            predicate.sensor,
            predicate.threshold,
            predicate.above,
            predicate.min_readings,
        );
        if hit {
            matched.push(predicate.sensor);
        } else if inspected >= predicate.min_readings {
            // The sensor has enough data and contradicts the pattern
            debug!(
                truck_id = %hub.truck_id(),
                pattern = %pattern.name,
                sensor = %predicate.sensor,
                "Pattern contradicted by sensor data"
            );
            return None;
        } else if predicate.sensor == pattern.primary_sensor {
            // The primary sensor must always corroborate
            return None;
        }
        // Correlated sensor without data: neither corroborates nor blocks
    }

    if !matched.contains(&pattern.primary_sensor) {
        return None;
    }

    let fraction = matched.len() as f64 / pattern.predicates.len() as f64;
    let confidence = pattern.confidence * fraction;

    info!(
        truck_id = %hub.truck_id(),
        pattern = %pattern.name,
        confidence,
        matched = matched.len(),
        "Failure pattern matched"
    );

    Some(CorrelationEvent {
        truck_id: hub.truck_id().to_string(),
        timestamp,
        pattern_name: pattern.name.clone(),
        predicted_component: pattern.predicted_component.clone(),
        recommended_action: pattern.recommended_action.clone(),
        confidence,
        matched_sensors: matched,
    })
}

/// Batch sweep: find components failing on a systemic share of the fleet.
///
/// `failures` maps each truck to the components it currently has failures
/// on; `observed_trucks` is the denominator (all trucks seen this cycle).
pub fn fleet_wide_patterns(
    failures: &HashMap<String, Vec<String>>,
    observed_trucks: usize,
    config: &CorrelationConfig,
) -> Vec<FleetPatternInsight> {
    if observed_trucks == 0 {
        return Vec::new();
    }

    let mut by_component: HashMap<&str, Vec<&str>> = HashMap::new();
    for (truck_id, components) in failures {
        for component in components {
            let trucks = by_component.entry(component.as_str()).or_default();
            if !trucks.contains(&truck_id.as_str()) {
                trucks.push(truck_id.as_str());
            }
        }
    }

    let mut insights: Vec<FleetPatternInsight> = by_component
        .into_iter()
        .filter_map(|(component, trucks)| {
            let fraction = trucks.len() as f64 / observed_trucks as f64;
            if trucks.len() >= config.min_trucks_for_pattern
                && fraction >= config.fleet_wide_issue_pct
            {
                let mut truck_ids: Vec<String> =
                    trucks.into_iter().map(str::to_string).collect();
                truck_ids.sort();
                Some(FleetPatternInsight {
                    component: component.to_string(),
                    truck_ids,
                    fleet_fraction: fraction,
                })
            } else {
                None
            }
        })
        .collect();
    insights.sort_by(|a, b| {
        b.fleet_fraction
            .partial_cmp(&a.fleet_fraction)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    insights
}
