//! Error types for the fc-app service layer.

use std::path::PathBuf;

use fc_controls::ControlError;

/// Failure reported by the thermostat service.
///
/// Every variant is transient from the loop's point of view: the tick is
/// abandoned and retried after the backoff interval.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Rate limited by the thermostat service")]
    RateLimited,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Why a single control-loop step was abandoned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoopError {
    #[error("Thermostat service error: {0}")]
    Api(#[from] ApiError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Invalid {what} from thermostat service: {value}")]
    InvalidInput { what: &'static str, value: f64 },
}

/// Application error type that wraps errors from the control and
/// configuration layers and provides a unified error interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        source: serde_yaml::Error,
    },

    #[error("Configuration invalid: {0}")]
    Validation(String),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),
}

/// Result type for fc-app operations.
pub type AppResult<T> = Result<T, AppError>;
