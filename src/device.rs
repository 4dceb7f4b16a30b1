//! A single fan-bearing GPU and its hwmon endpoints

use crate::{
    errors::{FanControlError, Result},
    logging::Logger,
    source::DeviceSource,
};
use std::{collections::HashMap, fmt, io, path::PathBuf, str::FromStr, sync::Arc};

/// `pwm1_enable` value handing fan control back to the driver
pub const PWM_MODE_AUTOMATIC: u32 = 2;

/// `pwm1_enable` value for manual control through `pwm1`
pub const PWM_MODE_MANUAL: u32 = 1;

/// hwmon endpoints the controller knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// GPU edge temperature in millidegrees
    Temperature,
    /// Fan tachometer in RPM
    FanSpeed,
    PwmMax,
    PwmMin,
    PwmEnable,
    Pwm,
}

impl Endpoint {
    pub const ALL: [Endpoint; 6] = [
        Endpoint::Temperature,
        Endpoint::FanSpeed,
        Endpoint::PwmMax,
        Endpoint::PwmMin,
        Endpoint::PwmEnable,
        Endpoint::Pwm,
    ];

    /// Endpoints a card must expose to be controllable. The tachometer is
    /// telemetry only and may be absent.
    pub const REQUIRED: [Endpoint; 5] = [
        Endpoint::Temperature,
        Endpoint::PwmMax,
        Endpoint::PwmMin,
        Endpoint::PwmEnable,
        Endpoint::Pwm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Temperature => "temp1_input",
            Endpoint::FanSpeed => "fan1_input",
            Endpoint::PwmMax => "pwm1_max",
            Endpoint::PwmMin => "pwm1_min",
            Endpoint::PwmEnable => "pwm1_enable",
            Endpoint::Pwm => "pwm1",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rescale a speed percentage into the device's native PWM range.
///
/// Fans stall below `min`, so 0% maps to `min` rather than to zero.
pub fn map_speed(percent: i32, min: u32, max: u32) -> u32 {
    if percent >= 100 {
        max
    } else if percent <= 0 {
        min
    } else {
        let min = f64::from(min);
        let max = f64::from(max);
        (min + (max - min) * f64::from(percent) / 100.0).round() as u32
    }
}

/// One controllable card
pub struct Device {
    id: String,
    endpoints: HashMap<Endpoint, PathBuf>,
    source: Arc<dyn DeviceSource>,
    logger: Logger,
}

impl Device {
    /// Open a card, failing when any required endpoint is missing
    pub fn open(id: &str, source: Arc<dyn DeviceSource>, logger: Logger) -> Result<Self> {
        let located = source.locate(id).map_err(|e| FanControlError::Device {
            device: id.to_string(),
            endpoint: "hwmon".to_string(),
            source: e,
        })?;

        if let Some(missing) = Endpoint::REQUIRED
            .iter()
            .find(|e| !located.contains_key(e.name()))
        {
            return Err(FanControlError::MissingEndpoint {
                device: id.to_string(),
                endpoint: missing.name().to_string(),
            });
        }

        let endpoints = Endpoint::ALL
            .iter()
            .filter_map(|e| located.get(e.name()).map(|path| (*e, path.clone())))
            .collect();

        Ok(Self {
            id: id.to_string(),
            endpoints,
            source,
            logger,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint_path(&self, endpoint: Endpoint) -> Option<&PathBuf> {
        self.endpoints.get(&endpoint)
    }

    fn io_error(&self, endpoint: Endpoint, source: io::Error) -> FanControlError {
        FanControlError::Device {
            device: self.id.clone(),
            endpoint: endpoint.name().to_string(),
            source,
        }
    }

    fn read_endpoint(&self, endpoint: Endpoint) -> Result<String> {
        let path = self.endpoints.get(&endpoint).ok_or_else(|| {
            self.io_error(endpoint, io::Error::from(io::ErrorKind::NotFound))
        })?;
        self.source
            .read(path)
            .map_err(|e| self.io_error(endpoint, e))
    }

    fn read_value<T: FromStr>(&self, endpoint: Endpoint) -> Result<T> {
        let raw = self.read_endpoint(endpoint)?;
        raw.trim()
            .parse()
            .map_err(|_| FanControlError::InvalidReading {
                device: self.id.clone(),
                endpoint: endpoint.name().to_string(),
                value: raw.trim().to_string(),
            })
    }

    fn write_endpoint(&self, endpoint: Endpoint, value: u32) -> Result<()> {
        let path = self.endpoints.get(&endpoint).ok_or_else(|| {
            self.io_error(endpoint, io::Error::from(io::ErrorKind::NotFound))
        })?;

        match self.source.write(path, &value.to_string()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(FanControlError::PermissionDenied {
                    device: self.id.clone(),
                    endpoint: endpoint.name().to_string(),
                })
            }
            Err(e) => Err(self.io_error(endpoint, e)),
        }
    }

    /// GPU temperature in °C
    pub fn temperature(&self) -> Result<f32> {
        let millidegrees: i64 = self.read_value(Endpoint::Temperature)?;
        Ok(millidegrees as f32 / 1000.0)
    }

    /// Fan speed in RPM, 0 when the tachometer can't be read
    pub fn fan_speed(&self) -> u32 {
        self.read_value(Endpoint::FanSpeed).unwrap_or(0)
    }

    pub fn pwm_min(&self) -> Result<u32> {
        self.read_value(Endpoint::PwmMin)
    }

    pub fn pwm_max(&self) -> Result<u32> {
        self.read_value(Endpoint::PwmMax)
    }

    /// Hand the fan to the driver (`true`) or take manual control (`false`)
    pub fn set_automatic(&self, enabled: bool) -> Result<()> {
        let mode = if enabled {
            PWM_MODE_AUTOMATIC
        } else {
            PWM_MODE_MANUAL
        };
        self.write_endpoint(Endpoint::PwmEnable, mode)
    }

    /// Set the fan to `percent` of its PWM range, returning the raw value written
    pub fn set_speed_percent(&self, percent: i32) -> Result<u32> {
        let min = self.pwm_min()?;
        let max = self.pwm_max()?;
        let raw = map_speed(percent, min, max);

        self.set_automatic(false)?;
        self.write_endpoint(Endpoint::Pwm, raw)?;

        self.logger.debug(format_args!(
            "{}: set fan to {}% (pwm {} in [{}, {}])",
            self.id, percent, raw, min, max
        ));
        Ok(raw)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
