//! Action items — prioritizable maintenance recommendations
//!
//! Created by the synthesizer, possibly merged by the deduplicator, emitted
//! in the command-center snapshot, never mutated after emission.

use serde::{Deserialize, Serialize};

/// Truck id used for fleet-wide pattern items.
pub const FLEET_TRUCK_ID: &str = "FLEET";

/// Priority label derived from the 0-100 priority score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Band mapping: >=85 CRITICAL, 65-84 HIGH, 40-64 MEDIUM, 20-39 LOW, <20 NONE.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Priority::Critical
        } else if score >= 65.0 {
            Priority::High
        } else if score >= 40.0 {
            Priority::Medium
        } else if score >= 20.0 {
            Priority::Low
        } else {
            Priority::None
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "CRITICAL"),
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
            Priority::None => write!(f, "NONE"),
        }
    }
}

/// Confidence in the underlying signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemConfidence {
    Low,
    Medium,
    High,
}

/// Recommended urgency of action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    StopImmediately,
    Inspect,
    ScheduleToday,
    ScheduleThisWeek,
    ScheduleThisMonth,
    Monitor,
    NoAction,
}

/// Item category, mirroring the component-normalization table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Engine,
    Transmission,
    Def,
    Fuel,
    Electrical,
    Brakes,
    Sensor,
    Gps,
    Turbo,
    Efficiency,
    Driver,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Engine => "engine",
            Category::Transmission => "transmission",
            Category::Def => "def",
            Category::Fuel => "fuel",
            Category::Electrical => "electrical",
            Category::Brakes => "brakes",
            Category::Sensor => "sensor",
            Category::Gps => "gps",
            Category::Turbo => "turbo",
            Category::Efficiency => "efficiency",
            Category::Driver => "driver",
        };
        f.write_str(s)
    }
}

/// Parsed cost range. The source's string-vs-number drift is resolved on
/// ingress; a display string is rendered only at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl CostRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            avg: (min + max) / 2.0,
        }
    }

    /// Render as "$8,000 – $15,000" for API payloads.
    pub fn display(&self) -> String {
        format!("{} – {}", format_dollars(self.min), format_dollars(self.max))
    }
}

fn format_dollars(v: f64) -> String {
    let whole = v.round() as i64;
    let mut s = whole.abs().to_string();
    let mut grouped = String::with_capacity(s.len() + s.len() / 3);
    while s.len() > 3 {
        let rest = s.split_off(s.len() - 3);
        grouped = if grouped.is_empty() {
            rest
        } else {
            format!("{},{}", rest, grouped)
        };
    }
    grouped = if grouped.is_empty() {
        s
    } else {
        format!("{},{}", s, grouped)
    };
    format!("${}", grouped)
}

/// A prioritizable maintenance recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    /// Opaque id: `ACT-YYYYMMDD-XXXXXXXX`
    pub id: String,
    /// Truck id, or [`FLEET_TRUCK_ID`] for fleet-wide patterns
    pub truck_id: String,
    pub priority: Priority,
    /// 0-100 blended priority score
    pub priority_score: f64,
    pub category: Category,
    /// Normalized canonical component name
    pub component: String,
    pub title: String,
    pub description: String,
    pub days_to_critical: Option<f64>,
    pub cost_if_ignored: Option<CostRange>,
    /// Display strings for the dashboard drill-down
    pub current_value: Option<String>,
    pub trend: Option<String>,
    pub threshold: Option<String>,
    pub confidence: ItemConfidence,
    pub action_type: ActionType,
    /// Ordered short steps for the operator
    pub action_steps: Vec<String>,
    /// Icon glyph for the dashboard
    pub icon: String,
    /// Detector names that produced or corroborated this item
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_bands() {
        assert_eq!(Priority::from_score(92.0), Priority::Critical);
        assert_eq!(Priority::from_score(85.0), Priority::Critical);
        assert_eq!(Priority::from_score(84.9), Priority::High);
        assert_eq!(Priority::from_score(65.0), Priority::High);
        assert_eq!(Priority::from_score(50.0), Priority::Medium);
        assert_eq!(Priority::from_score(25.0), Priority::Low);
        assert_eq!(Priority::from_score(10.0), Priority::None);
    }

    #[test]
    fn cost_range_display_groups_thousands() {
        let range = CostRange::new(8000.0, 15000.0);
        assert_eq!(range.display(), "$8,000 – $15,000");
        assert!((range.avg - 11500.0).abs() < f64::EPSILON);

        let small = CostRange::new(500.0, 900.0);
        assert_eq!(small.display(), "$500 – $900");
    }
}
