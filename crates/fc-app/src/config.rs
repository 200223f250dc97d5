//! Loop configuration: loading, validation, and serialization.
//!
//! Every section has defaults, so an empty YAML document is a valid
//! configuration.

use std::path::Path;
use std::time::Duration;

use fc_controls::{BoundConfig, ControllerGains};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Complete configuration of the control loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub bounds: BoundConfig,
    pub gains: ControllerGains,
    pub zones: ZoneConfig,
    pub schedule: ScheduleConfig,
}

/// How zone snapshots are turned into controller setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Subtracted from the commanded setpoint so the thermostat's own
    /// algorithm stays out of the way (°C).
    pub temperature_offset: f64,
    /// Setpoint used for zones whose heating is switched off (°C).
    pub frost_protection: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            temperature_offset: 0.5,
            frost_protection: 5.0,
        }
    }
}

/// Loop cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause between successful ticks. Kept above a minute, faster polling
    /// upsets the thermostat service.
    pub poll_interval_secs: u64,
    /// Pause after a failed tick.
    pub backoff_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 90,
            backoff_interval_secs: 600,
        }
    }
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backoff_interval(&self) -> Duration {
        Duration::from_secs(self.backoff_interval_secs)
    }
}

impl LoopConfig {
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        serde_yaml::from_str(content).map_err(|source| AppError::Parse {
            what: "configuration",
            source,
        })
    }

    pub fn to_yaml(&self) -> AppResult<String> {
        serde_yaml::to_string(self).map_err(|source| AppError::Parse {
            what: "configuration",
            source,
        })
    }

    /// Check every section; returns the first problem found.
    pub fn validate(&self) -> AppResult<()> {
        self.bounds.validate()?;
        self.gains.validate()?;

        if !self.zones.temperature_offset.is_finite() || !self.zones.frost_protection.is_finite() {
            return Err(AppError::Validation(
                "zone temperatures must be finite".to_string(),
            ));
        }
        if self.zones.temperature_offset < 0.0 {
            return Err(AppError::Validation(
                "temperature_offset must be non-negative".to_string(),
            ));
        }
        if self.schedule.poll_interval_secs == 0 {
            return Err(AppError::Validation(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.schedule.backoff_interval_secs == 0 {
            return Err(AppError::Validation(
                "backoff_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a YAML file. Does not validate.
pub fn load_config(path: &Path) -> AppResult<LoopConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    LoopConfig::from_yaml_str(&content)
}
