//! Configuration file handling

use crate::{
    curve::{ControlPoint, Curve},
    defaults::DEFAULT_FAN_CONFIG,
    errors::{FanControlError, Result},
};
use log::info;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Places searched for a configuration file, in order. When none exists the
/// default configuration is written to the last one.
pub const CONFIG_LOCATIONS: [&str; 1] = ["/etc/amdfan.yml"];

/// Default seconds between two control ticks
pub const DEFAULT_FREQUENCY: u64 = 5;

fn default_frequency() -> u64 {
    DEFAULT_FREQUENCY
}

/// Parsed configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// `[temperature, speed]` control points of the fan curve
    pub speed_matrix: Vec<ControlPoint>,

    /// Cards to manage, every compatible card when absent
    #[serde(default)]
    pub cards: Option<Vec<String>>,

    /// Half-width of the hysteresis band in °C, zero disables it
    #[serde(default)]
    pub threshold: i32,

    /// Seconds between two control ticks
    #[serde(default = "default_frequency")]
    pub frequency: u64,
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| FanControlError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frequency == 0 {
            return Err(FanControlError::Config(
                "frequency must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn curve(&self) -> Result<Curve> {
        Ok(Curve::new(self.speed_matrix.clone())?)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.frequency)
    }

    /// Hysteresis half-width, `None` when disabled
    pub fn hysteresis(&self) -> Option<i32> {
        (self.threshold > 0).then_some(self.threshold)
    }
}

/// First existing configuration file among `locations`
pub fn locate<P: AsRef<Path>>(locations: &[P]) -> Option<PathBuf> {
    locations
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

/// Locate a configuration file, writing the default one to the last location
/// when none exists
pub fn ensure<P: AsRef<Path>>(locations: &[P]) -> Result<PathBuf> {
    if let Some(path) = locate(locations) {
        info!("Found configuration file at {}", path.display());
        return Ok(path);
    }

    let path = locations
        .last()
        .map(|p| p.as_ref().to_path_buf())
        .ok_or_else(|| FanControlError::Config("no configuration location".to_string()))?;

    info!("No config found, creating one in {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, DEFAULT_FAN_CONFIG)?;
    Ok(path)
}
