//! Error types for control system operations.

use thiserror::Error;

/// Result type for control system operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control system operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Output range is empty or inverted.
    #[error("Invalid output bounds: min={min}, max={max}")]
    InvalidBounds { min: f64, max: f64 },

    /// A value that must be finite was not.
    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    /// Aggregation was asked to combine zero zone outputs.
    #[error("Cannot aggregate an empty set of zone outputs")]
    EmptyAggregate,
}

impl From<fc_core::CoreError> for ControlError {
    fn from(err: fc_core::CoreError) -> Self {
        match err {
            fc_core::CoreError::NonFinite { what, value } => ControlError::NonFinite { what, value },
        }
    }
}
