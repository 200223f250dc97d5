//! Per-zone feedback controller.
//!
//! Each heating zone gets one [`ZoneController`] that turns a setpoint and a
//! sensed room temperature into the flow temperature that zone would like.
//! The controller is a PID with:
//! - Derivative on measurement (setpoint steps do not kick the output)
//! - Variable-interval integration (dt taken from consecutive timestamps)
//! - Anti-windup: the integral is clamped to the output bounds
//! - A slow bias term that builds up under persistent error and fades away
//!   once the zone settles
//!
//! The output is always inside the current [`OutputBounds`].

use core::fmt;

use fc_core::{Timestamp, ZoneId, seconds_between};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Tuning of a zone controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerGains {
    /// Proportional gain (flow degrees per degree of room error).
    pub kp: f64,
    /// Integral gain (flow degrees per degree of error per second).
    pub ki: f64,
    /// Derivative gain, applied to the measurement rate of change.
    pub kd: f64,
    /// Steady-state gain of the slow bias accumulator.
    pub kpom: f64,
    /// Weight of the slow bias accumulator in the output.
    pub weight_pom: f64,
    /// Fade rate of the slow bias accumulator (1/second).
    pub fade_pom: f64,
}

impl Default for ControllerGains {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.02,
            kd: 0.0,
            kpom: 6.0,
            weight_pom: 0.04,
            fade_pom: 0.004,
        }
    }
}

impl ControllerGains {
    /// Check that every gain is finite and non-negative.
    pub fn validate(&self) -> ControlResult<()> {
        let fields = [
            ("kp", self.kp, "kp must be non-negative"),
            ("ki", self.ki, "ki must be non-negative"),
            ("kd", self.kd, "kd must be non-negative"),
            ("kpom", self.kpom, "kpom must be non-negative"),
            ("weight_pom", self.weight_pom, "weight_pom must be non-negative"),
            ("fade_pom", self.fade_pom, "fade_pom must be non-negative"),
        ];
        for (what, value, negative) in fields {
            if !value.is_finite() {
                return Err(ControlError::NonFinite { what, value });
            }
            if value < 0.0 {
                return Err(ControlError::InvalidArg { what: negative });
            }
        }
        Ok(())
    }
}

/// Closed output range `[min, max]` of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputBounds {
    pub min: f64,
    pub max: f64,
}

impl OutputBounds {
    /// Create bounds; `min` must be strictly below `max` and both finite.
    pub fn new(min: f64, max: f64) -> ControlResult<Self> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ControlError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Individual contributions of the last update, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TermBreakdown {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub bias: f64,
}

/// Mutable feedback state of a zone controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneControllerState {
    /// Setpoint used by the last update.
    pub setpoint: f64,
    /// Measurement used by the last update; `None` before the first one.
    pub measurement: Option<f64>,
    /// Integral accumulator, kept inside the output bounds.
    pub integral: f64,
    /// Slow bias accumulator (before `weight_pom` is applied).
    pub bias: f64,
    /// Timestamp of the last update; `None` before the first one.
    pub last_update: Option<Timestamp>,
    /// Current (clamped) output.
    pub output: f64,
    /// Term contributions of the last update.
    pub terms: TermBreakdown,
}

/// Feedback controller for a single zone.
#[derive(Debug, Clone)]
pub struct ZoneController {
    id: ZoneId,
    name: String,
    gains: ControllerGains,
    bounds: OutputBounds,
    state: ZoneControllerState,
}

impl ZoneController {
    /// Create a controller whose output starts at `seed_output`.
    ///
    /// The seed is clamped to `bounds`. The first [`update`](Self::update)
    /// returns it unchanged so registering a zone never makes the system
    /// output jump.
    pub fn new(
        id: ZoneId,
        name: impl Into<String>,
        gains: ControllerGains,
        bounds: OutputBounds,
        setpoint: f64,
        seed_output: f64,
    ) -> ControlResult<Self> {
        gains.validate()?;
        let seed_output = fc_core::ensure_finite(seed_output, "seed_output")?;
        let output = bounds.clamp(seed_output);
        Ok(Self {
            id,
            name: name.into(),
            gains,
            bounds,
            state: ZoneControllerState {
                setpoint,
                measurement: None,
                integral: output,
                bias: 0.0,
                last_update: None,
                output,
                terms: TermBreakdown::default(),
            },
        })
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gains(&self) -> &ControllerGains {
        &self.gains
    }

    pub fn bounds(&self) -> OutputBounds {
        self.bounds
    }

    pub fn state(&self) -> &ZoneControllerState {
        &self.state
    }

    pub fn output(&self) -> f64 {
        self.state.output
    }

    pub fn terms(&self) -> TermBreakdown {
        self.state.terms
    }

    /// Replace the output range, re-clamping the integral and the held output.
    pub fn set_output_bounds(&mut self, bounds: OutputBounds) {
        self.bounds = bounds;
        self.state.integral = bounds.clamp(self.state.integral);
        self.state.output = bounds.clamp(self.state.output);
    }

    /// Compute a new output from a fresh setpoint and measurement taken at `now`.
    ///
    /// Callers must pass finite values; a zone without a usable measurement
    /// is skipped before it gets here.
    pub fn update(&mut self, setpoint: f64, measurement: f64, now: Timestamp) -> f64 {
        let gains = self.gains;
        let bounds = self.bounds;
        let error = setpoint - measurement;
        let p = gains.kp * error;

        let (previous_time, previous_measurement) =
            match (self.state.last_update, self.state.measurement) {
                (Some(t), Some(m)) => (t, m),
                _ => {
                    // First sighting: hold the seed, absorb P into the integral.
                    let integral = bounds.clamp(self.state.output - p);
                    self.state.integral = nan_or(integral, self.state.output);
                    self.state.terms = TermBreakdown {
                        p,
                        i: self.state.integral,
                        d: 0.0,
                        bias: 0.0,
                    };
                    self.record(setpoint, measurement, now);
                    return self.state.output;
                }
            };

        let dt = seconds_between(previous_time, now);
        let mut d = 0.0;
        if dt > 0.0 {
            let integral = bounds.clamp(self.state.integral + gains.ki * error * dt);
            self.state.integral = nan_or(integral, self.state.integral);

            d = -gains.kd * (measurement - previous_measurement) / dt;

            let keep = (-gains.fade_pom * dt).exp();
            let bias = self.state.bias * keep + gains.kpom * error * (1.0 - keep);
            self.state.bias = nan_or(bias, self.state.bias);
        }

        let bias = gains.weight_pom * self.state.bias;
        let raw = p + self.state.integral + d + bias;
        self.state.output = nan_or(bounds.clamp(raw), self.state.output);
        self.state.terms = TermBreakdown {
            p,
            i: self.state.integral,
            d,
            bias,
        };
        self.record(setpoint, measurement, now);
        self.state.output
    }

    fn record(&mut self, setpoint: f64, measurement: f64, now: Timestamp) {
        self.state.setpoint = setpoint;
        self.state.measurement = Some(measurement);
        self.state.last_update = Some(now);
    }
}

fn nan_or(value: f64, fallback: f64) -> f64 {
    if value.is_nan() { fallback } else { value }
}

impl fmt::Display for ZoneController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.state;
        write!(f, "{} ", self.name)?;
        match s.measurement {
            Some(m) => write!(f, "{m:.2}")?,
            None => write!(f, "--")?,
        }
        write!(
            f,
            " {:.2} {:.2} [{:.2} {:.2} {:.2} {:.2}]",
            s.setpoint, s.output, s.terms.p, s.terms.i, s.terms.d, s.terms.bias
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fc_core::{Clock, ManualClock};
    use std::time::Duration;

    fn bounds() -> OutputBounds {
        OutputBounds::new(20.0, 70.0).unwrap()
    }

    fn integral_only() -> ControllerGains {
        ControllerGains {
            kp: 0.0,
            ki: 0.01,
            kd: 0.0,
            kpom: 0.0,
            weight_pom: 0.0,
            fade_pom: 0.0,
        }
    }

    #[test]
    fn first_update_returns_seed() {
        let clock = ManualClock::at_epoch();
        let mut zc =
            ZoneController::new(ZoneId::new(1), "Living", ControllerGains::default(), bounds(), 21.0, 45.0)
                .unwrap();

        let out = zc.update(21.0, 19.0, clock.now());
        assert_eq!(out, 45.0);
        assert_eq!(zc.state().integral, 45.0);
    }

    #[test]
    fn first_update_is_bumpless_with_proportional_gain() {
        let mut clock = ManualClock::at_epoch();
        let gains = ControllerGains {
            kp: 2.0,
            ..integral_only()
        };
        let mut zc = ZoneController::new(ZoneId::new(1), "Bath", gains, bounds(), 21.0, 45.0).unwrap();

        assert_eq!(zc.update(21.0, 20.0, clock.now()), 45.0);
        assert_eq!(zc.state().integral, 43.0);

        // Zero error afterwards: P vanishes, output drops by exactly the P share.
        clock.advance(Duration::from_secs(90));
        let out = zc.update(21.0, 21.0, clock.now());
        assert!((out - 43.0).abs() < 1e-12);
    }

    #[test]
    fn seed_is_clamped_to_bounds() {
        let zc = ZoneController::new(ZoneId::new(1), "Hall", ControllerGains::default(), bounds(), 21.0, 90.0)
            .unwrap();
        assert_eq!(zc.output(), 70.0);
    }

    #[test]
    fn integral_accumulates_with_elapsed_time() {
        let mut clock = ManualClock::at_epoch();
        let mut zc = ZoneController::new(ZoneId::new(1), "Office", integral_only(), bounds(), 21.0, 40.0).unwrap();
        zc.update(21.0, 20.0, clock.now());

        clock.advance(Duration::from_secs(100));
        let out = zc.update(21.0, 20.0, clock.now());
        // 0.01 * 1.0 * 100 s
        assert!((out - 41.0).abs() < 1e-9);

        clock.advance(Duration::from_secs(50));
        let out = zc.update(21.0, 20.0, clock.now());
        assert!((out - 41.5).abs() < 1e-9);
    }

    #[test]
    fn integral_is_clamped_while_saturated() {
        let mut clock = ManualClock::at_epoch();
        let mut zc = ZoneController::new(ZoneId::new(1), "Attic", integral_only(), bounds(), 21.0, 69.0).unwrap();
        zc.update(21.0, 10.0, clock.now());

        for _ in 0..100 {
            clock.advance(Duration::from_secs(90));
            zc.update(21.0, 10.0, clock.now());
        }
        assert_eq!(zc.output(), 70.0);
        assert_eq!(zc.state().integral, 70.0);

        // One step of negative error leaves saturation immediately.
        clock.advance(Duration::from_secs(10));
        let out = zc.update(21.0, 22.0, clock.now());
        assert!(out < 70.0);
    }

    #[test]
    fn derivative_acts_on_measurement_not_setpoint() {
        let mut clock = ManualClock::at_epoch();
        let gains = ControllerGains {
            ki: 0.0,
            kd: 100.0,
            ..integral_only()
        };
        let mut zc = ZoneController::new(ZoneId::new(1), "Kitchen", gains, bounds(), 20.0, 40.0).unwrap();
        zc.update(20.0, 19.0, clock.now());

        // Setpoint step with constant measurement: no derivative kick.
        clock.advance(Duration::from_secs(10));
        zc.update(23.0, 19.0, clock.now());
        assert_eq!(zc.terms().d, 0.0);

        // Rising measurement pulls the output down.
        clock.advance(Duration::from_secs(10));
        zc.update(23.0, 19.5, clock.now());
        assert!((zc.terms().d + 5.0).abs() < 1e-9);
    }

    #[test]
    fn bias_converges_under_constant_error() {
        let mut clock = ManualClock::at_epoch();
        let gains = ControllerGains {
            ki: 0.0,
            kpom: 6.0,
            weight_pom: 0.04,
            fade_pom: 0.004,
            ..integral_only()
        };
        let mut zc = ZoneController::new(ZoneId::new(1), "Den", gains, bounds(), 21.0, 40.0).unwrap();
        zc.update(21.0, 20.0, clock.now());

        let mut previous = 0.0;
        for _ in 0..200 {
            clock.advance(Duration::from_secs(90));
            zc.update(21.0, 20.0, clock.now());
            let bias = zc.terms().bias;
            assert!(bias >= previous);
            assert!(bias <= 0.04 * 6.0 + 1e-12);
            previous = bias;
        }
        assert!((previous - 0.24).abs() < 1e-6);
    }

    #[test]
    fn bias_fades_at_zero_error() {
        let mut clock = ManualClock::at_epoch();
        let gains = ControllerGains {
            ki: 0.0,
            ..ControllerGains::default()
        };
        let mut zc = ZoneController::new(ZoneId::new(1), "Den", gains, bounds(), 21.0, 40.0).unwrap();
        zc.update(21.0, 19.0, clock.now());
        for _ in 0..20 {
            clock.advance(Duration::from_secs(90));
            zc.update(21.0, 19.0, clock.now());
        }
        let mut previous = zc.terms().bias;
        assert!(previous > 0.0);

        for _ in 0..50 {
            clock.advance(Duration::from_secs(90));
            zc.update(21.0, 21.0, clock.now());
            let bias = zc.terms().bias;
            assert!(bias < previous);
            assert!(bias > 0.0);
            previous = bias;
        }
        assert!(previous < 1e-3);
    }

    #[test]
    fn zero_elapsed_time_changes_nothing_but_proportional() {
        let clock = ManualClock::at_epoch();
        let mut zc = ZoneController::new(ZoneId::new(1), "Loft", ControllerGains::default(), bounds(), 21.0, 40.0)
            .unwrap();
        zc.update(21.0, 20.0, clock.now());
        let before = zc.state().clone();

        let out = zc.update(21.0, 15.0, clock.now());
        assert_eq!(out, before.output);
        assert_eq!(zc.state().integral, before.integral);
        assert_eq!(zc.state().bias, before.bias);
    }

    #[test]
    fn narrowing_bounds_reclamps_state() {
        let clock = ManualClock::at_epoch();
        let mut zc = ZoneController::new(ZoneId::new(1), "Study", ControllerGains::default(), bounds(), 21.0, 65.0)
            .unwrap();
        zc.update(21.0, 20.0, clock.now());

        zc.set_output_bounds(OutputBounds::new(20.0, 50.0).unwrap());
        assert_eq!(zc.output(), 50.0);
        assert_eq!(zc.state().integral, 50.0);
        assert_eq!(zc.bounds().max, 50.0);
    }

    #[test]
    fn display_renders_terms() {
        let clock = ManualClock::at_epoch();
        let mut zc = ZoneController::new(ZoneId::new(1), "Living", integral_only(), bounds(), 21.0, 45.0).unwrap();
        assert_eq!(zc.to_string(), "Living -- 21.00 45.00 [0.00 0.00 0.00 0.00]");
        zc.update(20.5, 19.25, clock.now());
        assert_eq!(zc.to_string(), "Living 19.25 20.50 45.00 [0.00 45.00 0.00 0.00]");
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(OutputBounds::new(70.0, 20.0).is_err());
        assert!(OutputBounds::new(20.0, 20.0).is_err());
        assert!(OutputBounds::new(f64::NAN, 20.0).is_err());

        let gains = ControllerGains {
            ki: -1.0,
            ..ControllerGains::default()
        };
        assert_eq!(
            gains.validate(),
            Err(ControlError::InvalidArg {
                what: "ki must be non-negative"
            })
        );
        assert!(
            ZoneController::new(ZoneId::new(1), "x", ControllerGains::default(), bounds(), 21.0, f64::INFINITY)
                .is_err()
        );
    }
}
