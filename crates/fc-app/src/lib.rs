//! Shared application service layer for flowctl.
//!
//! This crate connects the control primitives in `fc-controls` to the
//! thermostat service: it normalizes zone snapshots, owns the control loop's
//! scheduling and failure recovery, and loads configuration and replay
//! scenarios for the CLI.

pub mod api;
pub mod config;
pub mod control_loop;
pub mod error;
pub mod scripted;
pub mod snapshot;

// Re-export key types for convenience
pub use api::HeatingApi;
pub use config::{LoopConfig, ScheduleConfig, ZoneConfig, load_config};
pub use control_loop::{ControlLoop, LoopState, StepOutcome, SystemCommand, TickOutcome};
pub use error::{ApiError, ApiResult, AppError, AppResult, LoopError};
pub use scripted::{
    RecordedCommand, Scenario, ScenarioTick, ScriptedApi, ScriptedFailure, load_scenario,
};
pub use snapshot::{PowerState, ZoneSnapshot};
