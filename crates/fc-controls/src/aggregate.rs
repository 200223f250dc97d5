//! Combining zone outputs into one system command.
//!
//! All zones share the same flow water, so the system has to satisfy the
//! zone that needs the most heat: the combined output is the maximum.

use crate::error::{ControlError, ControlResult};

/// Max-of-outputs aggregation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregator;

impl Aggregator {
    /// Maximum of `outputs`. NaN entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::EmptyAggregate`] when `outputs` is empty and
    /// [`ControlError::NonFinite`] when no entry is a number.
    pub fn combine(&self, outputs: &[f64]) -> ControlResult<f64> {
        if outputs.is_empty() {
            return Err(ControlError::EmptyAggregate);
        }
        let max = outputs.iter().copied().fold(f64::NAN, f64::max);
        if max.is_nan() {
            return Err(ControlError::NonFinite {
                what: "aggregate output",
                value: max,
            });
        }
        Ok(max)
    }
}
