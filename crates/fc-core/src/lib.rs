//! fc-core: stable foundation for flowctl.
//!
//! Contains:
//! - numeric (finite checks and flow rounding)
//! - ids (stable zone identifiers)
//! - clock (wall clock and manual test clock)
//! - error (shared error types)

pub mod clock;
pub mod error;
pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use clock::{Clock, ManualClock, SystemClock, Timestamp, seconds_between};
pub use error::CoreError;
pub use ids::ZoneId;
pub use numeric::*;
