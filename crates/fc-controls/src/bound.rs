//! Weather-compensated output ceiling.
//!
//! The hotter the flow water, the faster rooms heat up, but on a mild day a
//! high flow temperature only produces overshoot. The estimator maps the
//! outdoor temperature linearly between two calibration points and clamps
//! the result into `[flow_max_at_high_temp, flow_max_at_low_temp]`.
//!
//! Recomputation is throttled: within one refresh interval the cached value
//! is returned no matter what outdoor temperature is passed in.

use std::time::Duration;

use fc_core::{Timestamp, seconds_between};
use serde::{Deserialize, Serialize};

use crate::controller::OutputBounds;
use crate::error::{ControlError, ControlResult};

/// Calibration of the weather compensation curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundConfig {
    /// Lower end of every controller's output range.
    pub flow_min: f64,
    /// Ceiling at `low_outside_temp`.
    pub flow_max_at_low_temp: f64,
    /// Ceiling at `high_outside_temp`.
    pub flow_max_at_high_temp: f64,
    /// Cold calibration point (°C).
    pub low_outside_temp: f64,
    /// Warm calibration point (°C).
    pub high_outside_temp: f64,
    /// Minimum time between two recomputations.
    pub refresh_interval_secs: u64,
}

impl Default for BoundConfig {
    fn default() -> Self {
        Self {
            flow_min: 20.0,
            flow_max_at_low_temp: 70.0,
            flow_max_at_high_temp: 40.0,
            low_outside_temp: -10.0,
            high_outside_temp: 20.0,
            refresh_interval_secs: 3600,
        }
    }
}

impl BoundConfig {
    pub fn validate(&self) -> ControlResult<()> {
        let fields = [
            ("flow_min", self.flow_min),
            ("flow_max_at_low_temp", self.flow_max_at_low_temp),
            ("flow_max_at_high_temp", self.flow_max_at_high_temp),
            ("low_outside_temp", self.low_outside_temp),
            ("high_outside_temp", self.high_outside_temp),
        ];
        for (what, value) in fields {
            fc_core::ensure_finite(value, what)?;
        }
        if self.flow_min >= self.flow_max_at_high_temp {
            return Err(ControlError::InvalidArg {
                what: "flow_min must be less than flow_max_at_high_temp",
            });
        }
        if self.flow_max_at_high_temp >= self.flow_max_at_low_temp {
            return Err(ControlError::InvalidArg {
                what: "flow_max_at_high_temp must be less than flow_max_at_low_temp",
            });
        }
        if self.low_outside_temp >= self.high_outside_temp {
            return Err(ControlError::InvalidArg {
                what: "low_outside_temp must be less than high_outside_temp",
            });
        }
        if self.refresh_interval_secs == 0 {
            return Err(ControlError::InvalidArg {
                what: "refresh_interval_secs must be positive",
            });
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Last computed ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundEstimate {
    /// Rounded ceiling.
    pub ceiling: f64,
    /// Outdoor temperature it was computed from (°C).
    pub outside_temp: f64,
    pub computed_at: Timestamp,
}

/// Rate-limited outdoor-temperature to ceiling mapping.
#[derive(Debug, Clone)]
pub struct BoundEstimator {
    config: BoundConfig,
    last: Option<BoundEstimate>,
}

impl BoundEstimator {
    pub fn new(config: BoundConfig) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self { config, last: None })
    }

    pub fn config(&self) -> &BoundConfig {
        &self.config
    }

    /// Ceiling for `outside_temp`, ignoring the cache.
    pub fn interpolate(&self, outside_temp: f64) -> f64 {
        let c = &self.config;
        let (a_x, a_y) = (c.low_outside_temp, c.flow_max_at_low_temp);
        let (b_x, b_y) = (c.high_outside_temp, c.flow_max_at_high_temp);

        let ceiling = a_y + (b_y - a_y) / (b_x - a_x) * (outside_temp - a_x);
        ceiling
            .clamp(c.flow_max_at_high_temp, c.flow_max_at_low_temp)
            .round()
    }

    /// Whether [`compute`](Self::compute) would recalculate at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.last {
            None => true,
            Some(last) => {
                seconds_between(last.computed_at, now) >= self.config.refresh_interval_secs as f64
            }
        }
    }

    /// Ceiling for `outside_temp`, recomputed at most once per refresh interval.
    pub fn compute(&mut self, outside_temp: f64, now: Timestamp) -> f64 {
        if let Some(last) = self.last.filter(|_| !self.is_due(now)) {
            return last.ceiling;
        }
        let estimate = BoundEstimate {
            ceiling: self.interpolate(outside_temp),
            outside_temp,
            computed_at: now,
        };
        self.last = Some(estimate);
        estimate.ceiling
    }

    pub fn current(&self) -> Option<&BoundEstimate> {
        self.last.as_ref()
    }

    pub fn ceiling(&self) -> Option<f64> {
        self.last.map(|l| l.ceiling)
    }

    /// Controller output range for the current ceiling.
    pub fn output_bounds(&self) -> Option<OutputBounds> {
        // Validation guarantees flow_min < every possible ceiling.
        self.ceiling()
            .and_then(|ceiling| OutputBounds::new(self.config.flow_min, ceiling).ok())
    }
}
