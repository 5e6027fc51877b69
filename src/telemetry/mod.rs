//! Telemetry intake — validation and per-sensor buffering
//!
//! - `validator`: per-sensor range checks and timestamp monotonicity (C1)
//! - `buffer`: ring buffers with running Welford statistics (C2)

pub mod buffer;
pub mod validator;

pub use buffer::{SensorBaseline, SensorBuffer, SensorHub};
pub use validator::{validate_fields, ValidationOutcome};
