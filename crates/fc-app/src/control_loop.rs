//! The control loop: polling cadence, zone bookkeeping, and actuation.
//!
//! ```text
//! INITIALIZING --ok--> POLLING --err--> BACKOFF --ok--> POLLING
//!      |                  ^                |
//!      +------err---------+----------------+
//! ```
//!
//! A step either initializes (reads the boiler's current flow temperature)
//! or runs one tick. A tick reads everything it needs from the thermostat
//! service first, then updates working copies of the controllers and the
//! bound estimator, and commits them only once the actuator command (if one
//! is needed) has gone through. A failed step therefore leaves the loop
//! exactly as it was, and the retry after the backoff pause resumes from the
//! same state.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::time::Duration;

use fc_controls::{Aggregator, BoundEstimator, ZoneController};
use fc_core::{Clock, Timestamp, ZoneId, round_flow};
use tracing::{debug, error, info, warn};

use crate::api::HeatingApi;
use crate::config::LoopConfig;
use crate::error::{AppResult, LoopError};
use crate::snapshot::{PowerState, ZoneSnapshot};

/// Where the loop is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// The current boiler setting has not been read yet.
    Initializing,
    /// Last step succeeded.
    Polling,
    /// Last step failed; the next one retries.
    Backoff,
}

/// Last flow temperature the boiler is known to be set to.
///
/// The value read at startup counts as sent at tick 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemCommand {
    pub flow: i32,
    pub tick: u64,
    pub at: Timestamp,
}

/// Result of a successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new flow temperature was sent.
    Applied { flow: i32, previous: i32 },
    /// The rounded output matched the last command; nothing was sent.
    Unchanged { flow: i32 },
    /// No zone had a usable measurement.
    Idle,
}

/// Result of one state-machine step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Initialized { flow: i32 },
    Ticked(TickOutcome),
    Failed(LoopError),
}

/// Closed-loop flow-temperature regulator.
pub struct ControlLoop<A, C> {
    api: A,
    clock: C,
    config: LoopConfig,
    state: LoopState,
    estimator: BoundEstimator,
    aggregator: Aggregator,
    controllers: BTreeMap<ZoneId, ZoneController>,
    last_sent: Option<SystemCommand>,
    ticks: u64,
}

impl<A: HeatingApi, C: Clock> ControlLoop<A, C> {
    /// Build a loop from a configuration, which is validated here.
    pub fn new(api: A, clock: C, config: LoopConfig) -> AppResult<Self> {
        config.validate()?;
        let estimator = BoundEstimator::new(config.bounds)?;
        Ok(Self {
            api,
            clock,
            config,
            state: LoopState::Initializing,
            estimator,
            aggregator: Aggregator,
            controllers: BTreeMap::new(),
            last_sent: None,
            ticks: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut A {
        &mut self.api
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn estimator(&self) -> &BoundEstimator {
        &self.estimator
    }

    pub fn controllers(&self) -> &BTreeMap<ZoneId, ZoneController> {
        &self.controllers
    }

    pub fn controller(&self, id: ZoneId) -> Option<&ZoneController> {
        self.controllers.get(&id)
    }

    pub fn last_sent(&self) -> Option<SystemCommand> {
        self.last_sent
    }

    /// Number of ticks attempted so far (failed ones included).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one step and return how long to wait before the next.
    pub fn step(&mut self) -> (StepOutcome, Duration) {
        let result = match self.last_sent {
            None => self.initialize().map(|flow| StepOutcome::Initialized { flow }),
            Some(last) => self.tick(last).map(StepOutcome::Ticked),
        };

        match result {
            Ok(outcome) => {
                self.state = LoopState::Polling;
                let pause = match outcome {
                    // Go straight into the first tick.
                    StepOutcome::Initialized { .. } => Duration::ZERO,
                    _ => self.config.schedule.poll_interval(),
                };
                (outcome, pause)
            }
            Err(err) => {
                let pause = self.config.schedule.backoff_interval();
                error!(error = %err, retry_in_secs = pause.as_secs(), "Control step failed");
                self.state = LoopState::Backoff;
                (StepOutcome::Failed(err), pause)
            }
        }
    }

    /// Run one step, then sleep for the pause it asked for.
    pub fn run_step(&mut self) -> StepOutcome {
        let (outcome, pause) = self.step();
        if !pause.is_zero() {
            self.clock.sleep(pause);
        }
        outcome
    }

    /// Keep stepping while `keep_going` returns true for the last outcome.
    pub fn run_while(&mut self, mut keep_going: impl FnMut(&Self, &StepOutcome) -> bool) {
        loop {
            let outcome = self.run_step();
            if !keep_going(self, &outcome) {
                break;
            }
        }
    }

    fn initialize(&mut self) -> Result<i32, LoopError> {
        let current = self.api.current_flow_temperature()?;
        if !current.is_finite() {
            return Err(LoopError::InvalidInput {
                what: "flow temperature",
                value: current,
            });
        }
        let flow = round_flow(current);
        self.last_sent = Some(SystemCommand {
            flow,
            tick: 0,
            at: self.clock.now(),
        });
        info!(flow, "Read current flow temperature");
        Ok(flow)
    }

    fn tick(&mut self, last: SystemCommand) -> Result<TickOutcome, LoopError> {
        self.ticks += 1;
        let tick = self.ticks;
        let now = self.clock.now();

        let mut estimator = self.estimator.clone();
        if estimator.is_due(now) {
            let outside = self.api.outside_temperature()?;
            if !outside.is_finite() {
                return Err(LoopError::InvalidInput {
                    what: "outside temperature",
                    value: outside,
                });
            }
            let previous = estimator.ceiling();
            let ceiling = estimator.compute(outside, now);
            if previous != Some(ceiling) {
                info!(outside, ceiling, "Calculated flow max");
            }
        }
        let Some(bounds) = estimator.output_bounds() else {
            return Ok(TickOutcome::Idle);
        };

        let snapshots = self.api.list_zones()?;

        let mut controllers = self.controllers.clone();
        for controller in controllers.values_mut() {
            if controller.bounds() != bounds {
                controller.set_output_bounds(bounds);
            }
        }

        let seed = f64::from(last.flow);
        let mut outputs = Vec::with_capacity(snapshots.len());
        let mut active = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            debug!(zone = %snapshot.id, ?snapshot, "Zone snapshot");
            let Some((setpoint, measurement)) = self.zone_inputs(snapshot) else {
                continue;
            };

            let controller = match controllers.entry(snapshot.id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    info!(zone = %snapshot.id, name = %snapshot.name, seed, "Registering zone");
                    entry.insert(ZoneController::new(
                        snapshot.id,
                        snapshot.name.clone(),
                        self.config.gains,
                        bounds,
                        setpoint,
                        seed,
                    )?)
                }
            };
            outputs.push(controller.update(setpoint, measurement, now));
            active.push(snapshot.id);
        }

        if outputs.is_empty() {
            warn!("No zone reported a usable temperature, leaving flow unchanged");
            self.estimator = estimator;
            self.controllers = controllers;
            return Ok(TickOutcome::Idle);
        }

        let combined = self.aggregator.combine(&outputs)?;
        let flow = round_flow(combined);
        info!("{}", render_zones(&controllers, &active));

        let outcome = if flow != last.flow {
            info!(flow, previous = last.flow, "Setting flow");
            self.api.set_flow_temperature(flow)?;
            self.last_sent = Some(SystemCommand { flow, tick, at: now });
            TickOutcome::Applied {
                flow,
                previous: last.flow,
            }
        } else {
            TickOutcome::Unchanged { flow }
        };

        self.estimator = estimator;
        self.controllers = controllers;
        Ok(outcome)
    }

    /// Effective setpoint and measurement for a zone, or `None` to skip it.
    fn zone_inputs(&self, snapshot: &ZoneSnapshot) -> Option<(f64, f64)> {
        let Some(measurement) = snapshot.measurement else {
            debug!(zone = %snapshot.id, "Skipping zone (no inside temperature)");
            return None;
        };
        if !measurement.is_finite() {
            warn!(zone = %snapshot.id, measurement, "Skipping zone (invalid inside temperature)");
            return None;
        }

        let zones = &self.config.zones;
        let setpoint = match snapshot.power {
            PowerState::Off => zones.frost_protection,
            PowerState::On => match snapshot.setpoint {
                Some(setpoint) if setpoint.is_finite() => setpoint - zones.temperature_offset,
                other => {
                    warn!(zone = %snapshot.id, setpoint = ?other, "Skipping zone (no usable setpoint)");
                    return None;
                }
            },
        };
        Some((setpoint, measurement))
    }
}

/// One-line trace of the zones updated this tick.
fn render_zones(controllers: &BTreeMap<ZoneId, ZoneController>, active: &[ZoneId]) -> String {
    active
        .iter()
        .filter_map(|id| controllers.get(id))
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}
