//! Shared data structures for the fleet analytics pipeline
//!
//! - Telemetry: validated samples and the supervised sensor set
//! - Idle / refuel: derived per-sample readings and learned thresholds
//! - Anomaly: streaming detector events and persistent algorithm state
//! - Action: prioritizable recommendations flowing to the command center
//! - Fleet: per-truck risk and fleet-wide health aggregation
//! - Prediction: days-to-failure extrapolations

mod action;
mod anomaly;
mod fleet;
mod idle;
mod prediction;
mod refuel;
mod telemetry;

pub use action::*;
pub use anomaly::*;
pub use fleet::*;
pub use idle::*;
pub use prediction::*;
pub use refuel::*;
pub use telemetry::*;
