//! Fleet Health Score & Trend Ring
//!
//! The fleet score starts at 100 and is penalized by per-truck urgency
//! counts, by systemic same-component problems (a fleet-wide pattern hurts
//! more than one truck with many issues), and by maintenance age. A bounded
//! ring of snapshots backs the trend endpoint.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::config::{HealthConfig, RiskConfig};
use crate::types::{
    ActionItem, FleetHealthSnapshot, FleetTrend, Priority, UrgencySummary,
};

use super::risk::maintenance_penalty;

/// Count items by priority across the fleet.
pub fn urgency_summary(per_truck_items: &HashMap<String, Vec<ActionItem>>) -> UrgencySummary {
    let mut summary = UrgencySummary::default();
    for items in per_truck_items.values() {
        for item in items {
            match item.priority {
                Priority::Critical => summary.critical += 1,
                Priority::High => summary.high += 1,
                Priority::Medium => summary.medium += 1,
                Priority::Low => summary.low += 1,
                Priority::None => {}
            }
        }
    }
    summary
}

/// Compute the fleet health score, clamped to [0, 100].
pub fn fleet_health_score(
    per_truck_items: &HashMap<String, Vec<ActionItem>>,
    maintenance_days: &HashMap<String, f64>,
    total_trucks: usize,
    health: &HealthConfig,
    risk: &RiskConfig,
) -> f64 {
    if total_trucks == 0 {
        return 100.0;
    }

    let summary = urgency_summary(per_truck_items);
    let base_penalty = health.critical_penalty * summary.critical as f64
        + health.high_penalty * summary.high as f64
        + health.medium_penalty * summary.medium as f64
        + health.low_penalty * summary.low as f64;

    // Systemic penalty: the same component degraded (HIGH or worse) on a
    // meaningful share of trucks
    let mut component_trucks: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (truck_id, items) in per_truck_items {
        for item in items {
            if item.priority >= Priority::High {
                component_trucks
                    .entry(item.component.as_str())
                    .or_default()
                    .insert(truck_id.as_str());
            }
        }
    }
    let mut systemic_penalty = 0.0;
    for trucks in component_trucks.values() {
        let fraction = trucks.len() as f64 / total_trucks as f64;
        if trucks.len() >= 2 && fraction >= health.systemic_component_pct {
            systemic_penalty += health.systemic_penalty * fraction;
        }
    }

    // Maintenance penalty averaged across the fleet so one ancient truck
    // cannot zero the whole score
    let maintenance_total: f64 = maintenance_days
        .values()
        .map(|days| maintenance_penalty(Some(*days), risk))
        .sum();
    let maintenance_avg = maintenance_total / total_trucks as f64;

    (100.0 - base_penalty - systemic_penalty - maintenance_avg).clamp(0.0, 100.0)
}

/// Operator-facing status label for a score.
pub fn status_label(score: f64, total_trucks: usize) -> &'static str {
    if total_trucks == 0 {
        return "Sin datos";
    }
    if score >= 90.0 {
        "Excelente"
    } else if score >= 75.0 {
        "Bueno"
    } else if score >= 60.0 {
        "Atención Requerida"
    } else if score >= 40.0 {
        "Alerta"
    } else {
        "Crítico"
    }
}

// ============================================================================
// Trend ring
// ============================================================================

/// Bounded, process-wide ring of fleet health snapshots.
///
/// Guarded by a single mutex; writes arrive once per snapshot cycle.
pub struct HealthTrendRing {
    capacity: usize,
    band_pct: f64,
    ring: Mutex<Vec<FleetHealthSnapshot>>,
}

impl HealthTrendRing {
    pub fn new(capacity: usize, band_pct: f64) -> Self {
        Self {
            capacity: capacity.max(1),
            band_pct,
            ring: Mutex::new(Vec::new()),
        }
    }

    /// Append a snapshot, evicting the oldest at capacity.
    pub fn record(&self, snapshot: FleetHealthSnapshot) {
        if let Ok(mut ring) = self.ring.lock() {
            if ring.len() >= self.capacity {
                ring.remove(0);
            }
            ring.push(snapshot);
        }
    }

    pub fn len(&self) -> usize {
        self.ring.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots newer than `hours` ago, oldest first.
    pub fn recent(&self, hours: i64, now: DateTime<Utc>) -> Vec<FleetHealthSnapshot> {
        let cutoff = now - Duration::hours(hours);
        self.ring
            .lock()
            .map(|ring| {
                ring.iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Trend over the last `window` scores: compare the mean of the first
    /// half against the mean of the second half with a ±band.
    pub fn calculate_trend(&self, window: usize) -> FleetTrend {
        let scores: Vec<f64> = self
            .ring
            .lock()
            .map(|ring| {
                let skip = ring.len().saturating_sub(window);
                ring[skip..].iter().map(|s| s.score).collect()
            })
            .unwrap_or_default();

        if scores.len() < 4 {
            return FleetTrend::Stable;
        }

        let mid = scores.len() / 2;
        let first_mean: f64 = scores[..mid].iter().sum::<f64>() / mid as f64;
        let second_mean: f64 =
            scores[mid..].iter().sum::<f64>() / (scores.len() - mid) as f64;

        let band = first_mean.abs() * self.band_pct / 100.0;
        if second_mean > first_mean + band {
            FleetTrend::Improving
        } else if second_mean < first_mean - band {
            FleetTrend::Declining
        } else {
            FleetTrend::Stable
        }
    }
}
