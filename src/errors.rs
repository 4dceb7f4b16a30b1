//! Error types for the fan controller

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the fan controller
pub type Result<T> = std::result::Result<T, FanControlError>;

/// Main error type for the fan controller
#[derive(Error, Debug)]
pub enum FanControlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    Curve(#[from] CurveError),

    #[error("no compatible cards found")]
    NoCompatibleDevice,

    #[error("{device}: missing endpoint {endpoint}")]
    MissingEndpoint { device: String, endpoint: String },

    #[error("{device}: failed to access {endpoint}: {source}")]
    Device {
        device: String,
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{device}: unexpected value {value:?} in {endpoint}")]
    InvalidReading {
        device: String,
        endpoint: String,
        value: String,
    },

    #[error("{device}: permission denied writing {endpoint}, are you running as root?")]
    PermissionDenied { device: String, endpoint: String },

    #[error("Failed to read configuration {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FanControlError {
    /// Whether this error must bring the whole process down
    pub fn is_fatal(&self) -> bool {
        matches!(self, FanControlError::PermissionDenied { .. })
    }
}

/// Violations of the fan curve invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    #[error("fan curve needs at least two points, got {0}")]
    TooFewPoints(usize),

    #[error("fan curve speed {speed}% at {temp}°C is outside [0,100]")]
    SpeedOutOfRange { temp: i32, speed: i32 },

    #[error("fan curve temperatures should be strictly increasing ({previous}°C then {next}°C)")]
    TemperaturesNotIncreasing { previous: i32, next: i32 },

    #[error("fan curve speeds should be monotonically increasing ({previous}% then {next}%)")]
    SpeedsDecreasing { previous: i32, next: i32 },

    #[error("lowest fan curve speed is {0}%, it must be at least {}%", crate::MIN_SUPPORTED_SPEED)]
    BelowDriverFloor(i32),
}
