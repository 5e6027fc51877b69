//! Truck Risk Scorer
//!
//! Aggregates one truck's action items into a 0-100 risk score. Item scores
//! are weighted by component criticality and signal confidence, then a
//! maintenance-age penalty is added on top.

use crate::config::RiskConfig;
use crate::types::{ActionItem, ItemConfidence, RiskLevel, TruckRiskScore};

use crate::actions::components::{component_info, MAX_CRITICALITY};

fn confidence_weight(confidence: ItemConfidence) -> f64 {
    match confidence {
        ItemConfidence::High => 1.0,
        ItemConfidence::Medium => 0.8,
        ItemConfidence::Low => 0.6,
    }
}

/// Linear penalty for trucks past their maintenance grace period.
pub fn maintenance_penalty(days_since_maintenance: Option<f64>, config: &RiskConfig) -> f64 {
    match days_since_maintenance {
        Some(days) if days > config.maintenance_grace_days => ((days
            - config.maintenance_grace_days)
            * config.maintenance_penalty_per_day)
            .min(config.maintenance_penalty_cap),
        _ => 0.0,
    }
}

/// Compute the risk score for one truck from its (already deduplicated)
/// action items.
pub fn score_truck(
    truck_id: &str,
    items: &[ActionItem],
    days_since_maintenance: Option<f64>,
    config: &RiskConfig,
) -> TruckRiskScore {
    let mut weighted_sum = 0.0;
    let mut contributing: Vec<(f64, String)> = Vec::new();
    let mut predicted_failure_days: Option<f64> = None;

    for item in items {
        let criticality = component_info(&item.component)
            .map_or(1.0, |c| c.criticality / MAX_CRITICALITY);
        let contribution =
            item.priority_score * criticality * confidence_weight(item.confidence);
        weighted_sum += contribution;
        contributing.push((
            contribution,
            format!("{} ({} pts)", item.component, item.priority_score.round()),
        ));
        predicted_failure_days = match (predicted_failure_days, item.days_to_critical) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    let penalty = maintenance_penalty(days_since_maintenance, config);
    let risk_score = (weighted_sum / config.normalization + penalty).min(100.0);

    contributing.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let mut contributing_factors: Vec<String> =
        contributing.into_iter().take(5).map(|(_, label)| label).collect();
    if penalty > 0.0 {
        contributing_factors.push(format!("maintenance overdue (+{penalty:.0} pts)"));
    }

    TruckRiskScore {
        truck_id: truck_id.to_string(),
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        contributing_factors,
        days_since_last_maintenance: days_since_maintenance,
        active_issues_count: items.len(),
        predicted_failure_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, Category, Priority};

    fn item(component: &str, score: f64, confidence: ItemConfidence, days: Option<f64>) -> ActionItem {
        ActionItem {
            id: "ACT-20260801-00000001".to_string(),
            truck_id: "T001".to_string(),
            priority: Priority::from_score(score),
            priority_score: score,
            category: Category::Engine,
            component: component.to_string(),
            title: String::new(),
            description: String::new(),
            days_to_critical: days,
            cost_if_ignored: None,
            current_value: None,
            trend: None,
            threshold: None,
            confidence,
            action_type: ActionType::Monitor,
            action_steps: vec![],
            icon: String::new(),
            sources: vec![],
        }
    }

    fn config() -> RiskConfig {
        RiskConfig::default()
    }

    #[test]
    fn no_items_no_risk() {
        let score = score_truck("T001", &[], None, &config());
        assert_eq!(score.risk_score, 0.0);
        assert_eq!(score.risk_level, RiskLevel::Low);
        assert_eq!(score.active_issues_count, 0);
        assert_eq!(score.predicted_failure_days, None);
    }

    #[test]
    fn critical_transmission_items_drive_risk_up() {
        let items = vec![
            item("transmission", 90.0, ItemConfidence::High, Some(2.0)),
            item("transmission", 85.0, ItemConfidence::High, Some(5.0)),
            item("oil_system", 70.0, ItemConfidence::Medium, None),
        ];
        let score = score_truck("T001", &items, None, &config());
        assert!(score.risk_score > 60.0, "{}", score.risk_score);
        assert_eq!(score.predicted_failure_days, Some(2.0));
        assert_eq!(score.active_issues_count, 3);
        assert!(!score.contributing_factors.is_empty());
    }

    #[test]
    fn low_criticality_components_contribute_less() {
        let gps = vec![item("gps_receiver", 80.0, ItemConfidence::High, None)];
        let trans = vec![item("transmission", 80.0, ItemConfidence::High, None)];
        let gps_score = score_truck("T001", &gps, None, &config()).risk_score;
        let trans_score = score_truck("T001", &trans, None, &config()).risk_score;
        assert!(trans_score > gps_score);
    }

    #[test]
    fn maintenance_penalty_kicks_in_after_grace() {
        let c = config();
        assert_eq!(maintenance_penalty(Some(20.0), &c), 0.0);
        assert_eq!(maintenance_penalty(Some(30.0), &c), 0.0);
        assert!((maintenance_penalty(Some(40.0), &c) - 5.0).abs() < 1e-9);
        // Capped
        assert_eq!(maintenance_penalty(Some(500.0), &c), 25.0);
        assert_eq!(maintenance_penalty(None, &c), 0.0);
    }

    #[test]
    fn risk_never_exceeds_100() {
        let items: Vec<ActionItem> = (0..20)
            .map(|_| item("transmission", 100.0, ItemConfidence::High, Some(0.5)))
            .collect();
        let score = score_truck("T001", &items, Some(400.0), &config());
        assert!(score.risk_score <= 100.0);
        assert_eq!(score.risk_level, RiskLevel::Critical);
    }
}
