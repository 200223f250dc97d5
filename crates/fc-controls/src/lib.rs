//! Flow-temperature control primitives for flowctl.
//!
//! This crate holds the algorithmic part of the system: turning room
//! setpoints and sensor readings into a single boiler flow-temperature
//! command.
//!
//! # Architecture
//!
//! - [`BoundEstimator`] derives the legal output ceiling from the outdoor
//!   temperature (weather compensation), throttled to one recomputation per
//!   refresh interval.
//! - [`ZoneController`] runs one feedback loop per zone: PID with
//!   anti-windup plus a slowly fading bias term, clamped to the current
//!   [`OutputBounds`].
//! - [`Aggregator`] folds all zone outputs into one system command.
//!
//! Nothing here performs I/O or reads the clock; timestamps are passed in.

pub mod aggregate;
pub mod bound;
pub mod controller;
pub mod error;

pub use aggregate::Aggregator;
pub use bound::{BoundConfig, BoundEstimate, BoundEstimator};
pub use controller::{
    ControllerGains, OutputBounds, TermBreakdown, ZoneController, ZoneControllerState,
};
pub use error::{ControlError, ControlResult};
