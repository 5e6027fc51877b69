//! Aggregation layer — per-truck risk and fleet-wide health
//!
//! - `risk`: one truck's action items → 0-100 risk score
//! - `health`: fleet score, status labels, bounded trend ring
//! - `insights`: rule-templated operator phrases

pub mod health;
pub mod insights;
pub mod risk;

pub use health::{fleet_health_score, status_label, urgency_summary, HealthTrendRing};
pub use insights::generate_insights;
pub use risk::score_truck;
