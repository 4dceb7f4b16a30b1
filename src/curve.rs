//! Fan curve: validated control points and linear interpolation

use crate::errors::CurveError;
use crate::MIN_SUPPORTED_SPEED;
use serde::{Deserialize, Serialize};

/// One `[temperature, speed]` pair of the speed matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct ControlPoint {
    pub temp: i32,
    pub speed: i32,
}

impl ControlPoint {
    pub fn new(temp: i32, speed: i32) -> Self {
        Self { temp, speed }
    }
}

impl From<[i32; 2]> for ControlPoint {
    fn from([temp, speed]: [i32; 2]) -> Self {
        Self::new(temp, speed)
    }
}

impl From<ControlPoint> for [i32; 2] {
    fn from(point: ControlPoint) -> Self {
        [point.temp, point.speed]
    }
}

/// A validated temperature to fan speed mapping.
///
/// Temperatures are strictly increasing, speeds never decrease and stay within
/// `[MIN_SUPPORTED_SPEED, 100]`. A curve is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    points: Vec<ControlPoint>,
}

impl Curve {
    pub fn new(points: impl Into<Vec<ControlPoint>>) -> Result<Self, CurveError> {
        let points = points.into();

        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }

        if let Some(p) = points.iter().find(|p| !(0..=100).contains(&p.speed)) {
            return Err(CurveError::SpeedOutOfRange {
                temp: p.temp,
                speed: p.speed,
            });
        }

        for pair in points.windows(2) {
            if pair[1].temp <= pair[0].temp {
                return Err(CurveError::TemperaturesNotIncreasing {
                    previous: pair[0].temp,
                    next: pair[1].temp,
                });
            }
        }

        for pair in points.windows(2) {
            if pair[1].speed < pair[0].speed {
                return Err(CurveError::SpeedsDecreasing {
                    previous: pair[0].speed,
                    next: pair[1].speed,
                });
            }
        }

        let lowest = points.iter().map(|p| p.speed).min().unwrap_or_default();
        if lowest < MIN_SUPPORTED_SPEED {
            return Err(CurveError::BelowDriverFloor(lowest));
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// Fan speed percentage for a given temperature using linear interpolation,
    /// clamped to the end points outside the curve's temperature range
    pub fn evaluate(&self, temp: i32) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if temp <= first.temp {
            return f64::from(first.speed);
        }
        if temp >= last.temp {
            return f64::from(last.speed);
        }

        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if temp <= b.temp {
                let factor = (f64::from(temp) - f64::from(a.temp))
                    / (f64::from(b.temp) - f64::from(a.temp));
                return f64::from(a.speed) + factor * f64::from(b.speed - a.speed);
            }
        }

        f64::from(last.speed)
    }
}
