//! Action-item pipeline: synthesis, deduplication, prioritization
//!
//! - `components`: canonical component table (normalization, icons, costs)
//! - `synthesizer`: upstream signals → [`crate::types::ActionItem`]s
//! - `priority`: the 0-100 score blend, action IDs, source hierarchy
//! - `dedup`: merge duplicates per (truck, component), rank the result

pub mod components;
pub mod dedup;
pub mod priority;
pub mod synthesizer;

pub use dedup::dedup_and_rank;
pub use priority::{generate_action_id, priority_score, PriorityInputs};
