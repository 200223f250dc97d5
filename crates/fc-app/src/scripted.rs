//! Offline thermostat service driven by a YAML scenario.
//!
//! A scenario lists what the service reports at each poll. It lets the loop
//! be replayed deterministically, with injected failures, without touching
//! a real heating system.
//!
//! ```yaml
//! initial_flow: 45
//! outside_temperatures: [2.5, 4.0]
//! ticks:
//!   - zones:
//!       - { id: 1, name: Living, power: ON, setpoint: 21.0, measurement: 19.5 }
//!   - fail: list_zones
//!     zones:
//!       - { id: 1, name: Living, power: ON, setpoint: 21.0, measurement: 19.8 }
//! ```
//!
//! Each tick entry is consumed by one successful `list_zones` call. An
//! injected failure fires once, on the first matching call while that entry
//! is current, so the retry after backoff sees the same entry succeed. A
//! failed `set_flow` hands the entry back, since the loop retries the whole
//! tick.
//!
//! A scenario needs at least one outdoor reading; without one every tick
//! fails before its zones are served.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::api::HeatingApi;
use crate::error::{ApiError, ApiResult, AppError, AppResult};
use crate::snapshot::ZoneSnapshot;

/// Which call of a tick should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedFailure {
    OutsideTemperature,
    ListZones,
    SetFlow,
}

/// What the service reports at one poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTick {
    #[serde(default)]
    pub zones: Vec<ZoneSnapshot>,
    #[serde(default)]
    pub fail: Option<ScriptedFailure>,
}

/// A full replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Flow temperature the boiler is set to before the loop starts.
    pub initial_flow: f64,
    /// Outdoor readings, consumed one per request; the last one repeats.
    #[serde(default)]
    pub outside_temperatures: Vec<f64>,
    /// Number of initial `current_flow_temperature` calls that fail.
    #[serde(default)]
    pub failing_startup_reads: u32,
    #[serde(default)]
    pub ticks: Vec<ScenarioTick>,
}

impl Scenario {
    /// Parse and validate a scenario.
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let scenario: Self = serde_yaml::from_str(content).map_err(|source| AppError::Parse {
            what: "scenario",
            source,
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.initial_flow.is_finite() {
            return Err(AppError::Validation(
                "scenario initial_flow must be finite".to_string(),
            ));
        }
        if self.outside_temperatures.is_empty() {
            return Err(AppError::Validation(
                "scenario needs at least one outside temperature".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a replay scenario from a YAML file.
pub fn load_scenario(path: &Path) -> AppResult<Scenario> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Scenario::from_yaml_str(&content)
}

/// Flow command recorded by [`ScriptedApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Index of the scenario tick during which the command was sent.
    pub tick: usize,
    pub flow: i32,
}

/// [`HeatingApi`] that plays back a [`Scenario`].
#[derive(Debug, Clone)]
pub struct ScriptedApi {
    scenario: Scenario,
    next_tick: usize,
    next_outside: usize,
    startup_failures_left: u32,
    flow: f64,
    commands: Vec<RecordedCommand>,
    calls: usize,
}

impl ScriptedApi {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            flow: scenario.initial_flow,
            startup_failures_left: scenario.failing_startup_reads,
            scenario,
            next_tick: 0,
            next_outside: 0,
            commands: Vec::new(),
            calls: 0,
        }
    }

    /// Every flow command received, in order.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Scenario ticks already served.
    pub fn ticks_served(&self) -> usize {
        self.next_tick
    }

    /// True once every scripted tick has been served.
    pub fn is_exhausted(&self) -> bool {
        self.next_tick >= self.scenario.ticks.len()
    }

    /// Total number of calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls
    }

    fn take_failure(&mut self, index: usize, kind: ScriptedFailure) -> ApiResult<()> {
        match self.scenario.ticks.get_mut(index) {
            Some(tick) if tick.fail == Some(kind) => {
                tick.fail = None;
                Err(ApiError::Transport(format!(
                    "scripted {kind:?} failure at tick {index}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl HeatingApi for ScriptedApi {
    fn list_zones(&mut self) -> ApiResult<Vec<ZoneSnapshot>> {
        self.calls += 1;
        let index = self.next_tick;
        self.take_failure(index, ScriptedFailure::ListZones)?;
        let tick = self
            .scenario
            .ticks
            .get(index)
            .ok_or_else(|| ApiError::InvalidResponse("scenario exhausted".to_string()))?;
        let zones = tick.zones.clone();
        self.next_tick += 1;
        Ok(zones)
    }

    fn outside_temperature(&mut self) -> ApiResult<f64> {
        self.calls += 1;
        self.take_failure(self.next_tick, ScriptedFailure::OutsideTemperature)?;
        let readings = &self.scenario.outside_temperatures;
        let reading = readings
            .get(self.next_outside)
            .or_else(|| readings.last())
            .copied()
            .ok_or_else(|| ApiError::InvalidResponse("no outside temperature".to_string()))?;
        self.next_outside += 1;
        Ok(reading)
    }

    fn current_flow_temperature(&mut self) -> ApiResult<f64> {
        self.calls += 1;
        if self.startup_failures_left > 0 {
            self.startup_failures_left -= 1;
            return Err(ApiError::Auth("scripted startup failure".to_string()));
        }
        Ok(self.flow)
    }

    fn set_flow_temperature(&mut self, value: i32) -> ApiResult<()> {
        self.calls += 1;
        // Sent after the tick's zones were served.
        let tick = self.next_tick.saturating_sub(1);
        if let Err(err) = self.take_failure(tick, ScriptedFailure::SetFlow) {
            self.next_tick = tick;
            return Err(err);
        }
        self.flow = f64::from(value);
        self.commands.push(RecordedCommand { tick, flow: value });
        Ok(())
    }
}
