//! Orchestration — sharded per-truck pipeline
//!
//! - `state`: shard-owned per-truck state and the status machine
//! - `processor`: the C1→C12 flow for one sample
//! - `coordinator`: sharding, snapshots, offline checks, fleet aggregation

pub mod coordinator;
pub mod processor;
pub mod state;

pub use coordinator::{CommandCenterState, FleetView, PipelineCoordinator, TruckSnapshot};
pub use processor::{process_sample, SampleOutcome};
pub use state::{StatusMachine, TruckState};
