//! Rule-templated fleet insights
//!
//! Short operator-facing phrases (in the fleet's working language) derived
//! from the ranked action list. Each rule fires at most once per cycle.

use std::collections::HashMap;

use crate::types::{ActionItem, Priority, FLEET_TRUCK_ID};

/// Generate the textual insight list for the current action set.
pub fn generate_insights(items: &[ActionItem]) -> Vec<String> {
    let mut insights = Vec::new();

    let truck_items: Vec<&ActionItem> = items
        .iter()
        .filter(|i| i.truck_id != FLEET_TRUCK_ID)
        .collect();

    if truck_items.is_empty() {
        insights.push("Flota en excelente estado.".to_string());
        return insights;
    }

    // Critical trucks
    let mut critical_trucks: Vec<&str> = truck_items
        .iter()
        .filter(|i| i.priority == Priority::Critical)
        .map(|i| i.truck_id.as_str())
        .collect();
    critical_trucks.sort_unstable();
    critical_trucks.dedup();
    if let Some(first) = critical_trucks.first() {
        insights.push(format!(
            "{} camiones requieren atención inmediata, incluyendo {}",
            critical_trucks.len(),
            first
        ));
    }

    // Transmission failures inside a week are expensive
    if let Some(item) = truck_items.iter().find(|i| {
        i.component == "transmission" && i.days_to_critical.is_some_and(|d| d <= 7.0)
    }) {
        let days = item.days_to_critical.unwrap_or(7.0);
        let cost = item
            .cost_if_ignored
            .map_or_else(|| "$15,000 – $30,000".to_string(), |c| c.display());
        insights.push(format!(
            "Transmisión de {} podría fallar en {:.0} días - costo estimado {}",
            item.truck_id, days, cost
        ));
    }

    // DEF depletion risks an ECU derate
    if let Some(item) = truck_items
        .iter()
        .find(|i| i.component == "def_system" && i.priority >= Priority::High)
    {
        insights.push(format!(
            "{} con DEF crítico - riesgo de derate",
            item.truck_id
        ));
    }

    // Systemic same-component pattern
    let mut by_component: HashMap<&str, Vec<&str>> = HashMap::new();
    for item in &truck_items {
        let trucks = by_component.entry(item.component.as_str()).or_default();
        if !trucks.contains(&item.truck_id.as_str()) {
            trucks.push(item.truck_id.as_str());
        }
    }
    if let Some((component, trucks)) = by_component
        .iter()
        .filter(|(_, trucks)| trucks.len() >= 3)
        .max_by_key(|(_, trucks)| trucks.len())
    {
        insights.push(format!(
            "Patrón sistémico: {} camiones con problemas de {}",
            trucks.len(),
            component
        ));
    }

    // Escalation warning: short horizons hiding below CRITICAL
    let escalating = truck_items
        .iter()
        .filter(|i| {
            i.priority < Priority::Critical && i.days_to_critical.is_some_and(|d| d < 7.0)
        })
        .count();
    if escalating > 0 {
        insights.push(format!(
            "{escalating} problemas escalarán a crítico esta semana si no se atienden"
        ));
    }

    if insights.is_empty() {
        insights.push("Flota estable - mantenimiento preventivo al día.".to_string());
    }
    insights
}
