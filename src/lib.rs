//! Fan curve controller for AMD GPUs
//!
//! Reads GPU temperatures from hwmon, maps them through a user supplied fan curve and
//! writes the resulting speed back to the card's PWM endpoint.

pub mod args;
pub mod commands;
pub mod config;
pub mod controller;
pub mod curve;
pub mod daemon;
pub mod defaults;
pub mod device;
pub mod errors;
pub mod logging;
pub mod scanner;
pub mod source;

/// Lowest fan speed percentage the amdgpu driver handles correctly.
///
/// Lower values are known to misbehave on some cards; curves going below it are
/// rejected and negative interpolation results are clamped up to it.
pub const MIN_SUPPORTED_SPEED: i32 = 4;

// Re-export commonly used types
pub use controller::{ControlHandle, Controller};
pub use curve::{ControlPoint, Curve};
pub use device::Device;
pub use errors::{CurveError, FanControlError, Result};
pub use scanner::Registry;
