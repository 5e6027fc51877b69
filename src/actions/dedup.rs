//! Action-item deduplication and ranking
//!
//! Multiple detectors watching the same physical system produce overlapping
//! items. Stage A merges them: one primary per `(truck, component)` key
//! (fleet items key on category as well), secondaries folded in by unioning
//! sources, taking the most urgent time horizon and the best-known cost.

use std::collections::HashMap;
use tracing::debug;

use crate::types::{ActionItem, FLEET_TRUCK_ID};

use super::priority::{action_type_for, best_source, source_weight};

/// Merge duplicate items and rank the result by priority score.
pub fn dedup_and_rank(items: Vec<ActionItem>) -> Vec<ActionItem> {
    let mut groups: HashMap<String, Vec<ActionItem>> = HashMap::new();
    for item in items {
        groups.entry(dedup_key(&item)).or_default().push(item);
    }

    let mut merged: Vec<ActionItem> = groups
        .into_values()
        .map(|group| merge_group(group))
        .collect();

    merged.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                source_weight(best_source(&b.sources)).cmp(&source_weight(best_source(&a.sources)))
            })
            .then_with(|| a.truck_id.cmp(&b.truck_id))
            .then_with(|| a.component.cmp(&b.component))
    });
    merged
}

fn dedup_key(item: &ActionItem) -> String {
    if item.truck_id == FLEET_TRUCK_ID {
        format!("{}|{}|{}", item.truck_id, item.component, item.category)
    } else {
        format!("{}|{}", item.truck_id, item.component)
    }
}

fn merge_group(mut group: Vec<ActionItem>) -> ActionItem {
    if group.len() == 1 {
        return group.remove(0);
    }

    // Primary: highest priority score, ties broken by the strongest source
    let primary_idx = group
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.priority_score
                .partial_cmp(&b.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    source_weight(best_source(&a.sources))
                        .cmp(&source_weight(best_source(&b.sources)))
                })
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut primary = group.swap_remove(primary_idx);

    debug!(
        truck_id = %primary.truck_id,
        component = %primary.component,
        merged = group.len(),
        "Merging duplicate action items"
    );

    for secondary in group {
        // Union sources, preserving order of first appearance
        for source in secondary.sources {
            if !primary.sources.contains(&source) {
                primary.sources.push(source);
            }
        }
        // Most urgent horizon wins
        primary.days_to_critical = match (primary.days_to_critical, secondary.days_to_critical) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        // Primary's cost unless it has none
        if primary.cost_if_ignored.is_none() {
            primary.cost_if_ignored = secondary.cost_if_ignored;
        }
        if primary.current_value.is_none() {
            primary.current_value = secondary.current_value;
        }
        if primary.trend.is_none() {
            primary.trend = secondary.trend;
        }
        primary.confidence = primary.confidence.max(secondary.confidence);
    }

    if primary.sources.len() >= 3 {
        primary.description = format!(
            "Multiple systems corroborate a {} issue on {} ({} independent detectors)",
            primary.component,
            primary.truck_id,
            primary.sources.len()
        );
    }

    // The merged horizon may have shrunk; re-derive the recommended action
    primary.action_type = action_type_for(primary.priority, primary.days_to_critical);
    primary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, Category, CostRange, ItemConfidence, Priority};

    fn item(
        truck: &str,
        component: &str,
        score: f64,
        source: &str,
        days: Option<f64>,
        cost: Option<CostRange>,
    ) -> ActionItem {
        ActionItem {
            id: format!("ACT-20260801-{:08X}", score as u32),
            truck_id: truck.to_string(),
            priority: Priority::from_score(score),
            priority_score: score,
            category: Category::Engine,
            component: component.to_string(),
            title: format!("{component} issue"),
            description: format!("{component} issue on {truck}"),
            days_to_critical: days,
            cost_if_ignored: cost,
            current_value: None,
            trend: None,
            threshold: None,
            confidence: ItemConfidence::Medium,
            action_type: ActionType::Monitor,
            action_steps: vec![],
            icon: "🔧".to_string(),
            sources: vec![source.to_string()],
        }
    }

    #[test]
    fn two_sources_same_component_merge_into_one() {
        let sensor_health = item(
            "T001",
            "oil_system",
            70.0,
            "Sensor Health",
            Some(14.0),
            None,
        );
        let pm_engine = item(
            "T001",
            "oil_system",
            90.0,
            "Predictive Maintenance Engine",
            Some(5.0),
            Some(CostRange::new(8_000.0, 15_000.0)),
        );

        let merged = dedup_and_rank(vec![sensor_health, pm_engine]);
        assert_eq!(merged.len(), 1);
        let item = &merged[0];
        assert_eq!(item.priority, Priority::Critical);
        assert_eq!(item.sources.len(), 2);
        assert!(item.sources.contains(&"Predictive Maintenance Engine".to_string()));
        assert!(item.sources.contains(&"Sensor Health".to_string()));
        // PM Engine is primary — its cost wins
        assert_eq!(item.cost_if_ignored, Some(CostRange::new(8_000.0, 15_000.0)));
        // Most urgent horizon wins
        assert_eq!(item.days_to_critical, Some(5.0));
    }

    #[test]
    fn merged_days_is_min_ignoring_nulls() {
        let a = item("T001", "brakes", 60.0, "Sensor Health", None, None);
        let b = item("T001", "brakes", 80.0, "Failure Correlation", Some(3.0), None);
        let c = item("T001", "brakes", 50.0, "DTC Analysis", Some(9.0), None);

        let merged = dedup_and_rank(vec![a, b, c]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].days_to_critical, Some(3.0));
        // Three corroborating sources rewrites the description
        assert!(merged[0].description.contains("Multiple systems"));
    }

    #[test]
    fn primary_cost_survives_when_present() {
        let a = item(
            "T001",
            "transmission",
            90.0,
            "Predictive Maintenance Engine",
            Some(2.0),
            Some(CostRange::new(15_000.0, 30_000.0)),
        );
        let b = item(
            "T001",
            "transmission",
            70.0,
            "Sensor Health",
            None,
            Some(CostRange::new(1.0, 2.0)),
        );
        let merged = dedup_and_rank(vec![a, b]);
        assert_eq!(
            merged[0].cost_if_ignored,
            Some(CostRange::new(15_000.0, 30_000.0))
        );
    }

    #[test]
    fn different_trucks_never_merge() {
        let a = item("T001", "oil_system", 70.0, "Sensor Health", None, None);
        let b = item("T002", "oil_system", 80.0, "Sensor Health", None, None);
        let merged = dedup_and_rank(vec![a, b]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn fleet_items_key_on_category_too() {
        let mut a = item(FLEET_TRUCK_ID, "sensors", 60.0, "Sensor Health", None, None);
        a.category = Category::Sensor;
        let mut b = item(FLEET_TRUCK_ID, "sensors", 60.0, "Sensor Health", None, None);
        b.category = Category::Gps;
        let merged = dedup_and_rank(vec![a, b]);
        assert_eq!(merged.len(), 2, "different categories stay separate for FLEET");
    }

    #[test]
    fn tie_breaks_by_source_strength() {
        let weak = item("T001", "oil_system", 70.0, "DTC Analysis", Some(10.0), None);
        let strong = item(
            "T001",
            "oil_system",
            70.0,
            "Real-Time Predictive",
            None,
            Some(CostRange::new(100.0, 200.0)),
        );
        let merged = dedup_and_rank(vec![weak, strong]);
        // Real-Time Predictive wins the tie → its cost is primary
        assert_eq!(merged[0].cost_if_ignored, Some(CostRange::new(100.0, 200.0)));
    }

    #[test]
    fn ranking_is_by_score_descending() {
        let low = item("T001", "gps_receiver", 25.0, "Sensor Health", None, None);
        let high = item("T002", "transmission", 95.0, "Real-Time Predictive", Some(0.5), None);
        let mid = item("T003", "brakes", 55.0, "DTC Analysis", None, None);

        let ranked = dedup_and_rank(vec![low, high, mid]);
        let scores: Vec<f64> = ranked.iter().map(|i| i.priority_score).collect();
        assert_eq!(scores, vec![95.0, 55.0, 25.0]);
    }

    #[test]
    fn critical_merge_with_short_horizon_stops_the_truck() {
        let a = item("T001", "cooling_system", 90.0, "Failure Correlation", None, None);
        let b = item("T001", "cooling_system", 70.0, "Sensor Health", Some(0.5), None);
        let merged = dedup_and_rank(vec![a, b]);
        assert_eq!(merged[0].action_type, ActionType::StopImmediately);
    }
}
