//! Normalized view of a zone as reported by the thermostat service.

use fc_core::ZoneId;
use serde::{Deserialize, Serialize};

/// Heating power switch of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

/// One zone at one poll.
///
/// Whatever shape the upstream service uses, its adapter produces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub id: ZoneId,
    pub name: String,
    pub power: PowerState,
    /// Commanded room temperature (°C); usually absent while power is off.
    #[serde(default)]
    pub setpoint: Option<f64>,
    /// Sensed room temperature (°C).
    #[serde(default)]
    pub measurement: Option<f64>,
}

impl ZoneSnapshot {
    pub fn heating(id: ZoneId, name: impl Into<String>, setpoint: f64, measurement: f64) -> Self {
        Self {
            id,
            name: name.into(),
            power: PowerState::On,
            setpoint: Some(setpoint),
            measurement: Some(measurement),
        }
    }

    pub fn switched_off(id: ZoneId, name: impl Into<String>, measurement: Option<f64>) -> Self {
        Self {
            id,
            name: name.into(),
            power: PowerState::Off,
            setpoint: None,
            measurement,
        }
    }
}
