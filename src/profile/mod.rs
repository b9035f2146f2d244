//! Roast profiles and target-temperature interpolation.
//!
//! A [`Profile`] is an ordered list of [`Setpoint`]s. The target temperature
//! at any roast time comes from one of two [`Interpolation`] variants:
//!
//! - [`Interpolation::Spline`]: a natural cubic spline through every
//!   setpoint. The live control loop and the roast-start preview use it.
//! - [`Interpolation::Linear`]: straight segments between the bracketing
//!   setpoints. Persisted roast logs recompute their target column with it.
//!
//! Both variants return a setpoint's temperature exactly at its time, hold a
//! one-point profile constant, and clamp outside the setpoint span.

pub mod spline;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use spline::NaturalCubicSpline;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("Invalid profile: no setpoints")]
    Empty,
    #[error("Invalid profile: setpoint {index} is not a finite number")]
    NonFinite { index: usize },
    #[error("Invalid profile: setpoint {index} has negative time {time}")]
    NegativeTime { index: usize, time: f64 },
    #[error("Invalid profile: setpoint {index} at {time}s does not come after {previous}s")]
    NotIncreasing { index: usize, time: f64, previous: f64 },
}

/// A (time, temperature) anchor of the roast curve. Time is seconds since
/// roast start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    pub time: f64,
    pub temperature: f64,
}

impl Setpoint {
    pub fn new(time: f64, temperature: f64) -> Self {
        Self { time, temperature }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Spline,
    Linear,
}

/// Ordered setpoints defining a roast curve.
///
/// Deserialization does not validate; call [`Profile::validate`] (or build
/// through [`Profile::new`]) before using a profile from the outside world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub setpoints: Vec<Setpoint>,
}

/// Full target curve reported once when a roast starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewCurve {
    pub time: Vec<f64>,
    pub target_temperature: Vec<f64>,
}

/// Where a time falls relative to a setpoint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bracket {
    Before,
    Exact(usize),
    /// Strictly between setpoint `i` and `i + 1`.
    Between(usize),
    After,
}

/// A NaN time has no place in the span and is treated as before it.
pub(crate) fn bracket(points: &[Setpoint], t: f64) -> Bracket {
    if t.is_nan() {
        return Bracket::Before;
    }
    let last = points.len() - 1;
    if let Some(i) = points.iter().position(|p| p.time == t) {
        return Bracket::Exact(i);
    }
    if points.len() == 1 || t < points[0].time {
        return Bracket::Before;
    }
    if t > points[last].time {
        return Bracket::After;
    }
    // partition_point gives the first setpoint after t; t is strictly inside.
    let next = points.partition_point(|p| p.time < t);
    Bracket::Between(next - 1)
}

impl Profile {
    pub fn new(setpoints: Vec<Setpoint>) -> Result<Self, ProfileError> {
        let profile = Self { setpoints };
        profile.validate()?;
        Ok(profile)
    }

    /// One-point profile holding `temperature` for the whole roast.
    pub fn constant(temperature: f64) -> Self {
        Self {
            setpoints: vec![Setpoint::new(0.0, temperature)],
        }
    }

    /// Non-empty, finite, non-negative and strictly increasing in time.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.setpoints.is_empty() {
            return Err(ProfileError::Empty);
        }
        self.validate_order()
    }

    /// Same as [`Profile::validate`] but accepts an empty list.
    pub fn validate_order(&self) -> Result<(), ProfileError> {
        for (index, sp) in self.setpoints.iter().enumerate() {
            if !sp.time.is_finite() || !sp.temperature.is_finite() {
                return Err(ProfileError::NonFinite { index });
            }
            if sp.time < 0.0 {
                return Err(ProfileError::NegativeTime { index, time: sp.time });
            }
            if index > 0 {
                let previous = self.setpoints[index - 1].time;
                if sp.time <= previous {
                    return Err(ProfileError::NotIncreasing {
                        index,
                        time: sp.time,
                        previous,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.setpoints.is_empty()
    }

    pub fn first(&self) -> Option<&Setpoint> {
        self.setpoints.first()
    }

    pub fn last(&self) -> Option<&Setpoint> {
        self.setpoints.last()
    }

    /// Time of the last setpoint, i.e. the planned roast length.
    pub fn duration(&self) -> Option<f64> {
        self.last().map(|sp| sp.time)
    }

    pub fn spline(&self) -> Result<NaturalCubicSpline, ProfileError> {
        if self.setpoints.is_empty() {
            return Err(ProfileError::Empty);
        }
        Ok(NaturalCubicSpline::new(&self.setpoints))
    }

    pub fn target_temperature(&self, t: f64, mode: Interpolation) -> Result<f64, ProfileError> {
        match mode {
            Interpolation::Spline => Ok(self.spline()?.evaluate(t)),
            Interpolation::Linear => self.linear_target(t),
        }
    }

    fn linear_target(&self, t: f64) -> Result<f64, ProfileError> {
        let points = &self.setpoints;
        if points.is_empty() {
            return Err(ProfileError::Empty);
        }
        Ok(match bracket(points, t) {
            Bracket::Before => points[0].temperature,
            Bracket::Exact(i) => points[i].temperature,
            Bracket::After => points[points.len() - 1].temperature,
            Bracket::Between(i) => {
                let (a, b) = (points[i], points[i + 1]);
                a.temperature + (t - a.time) / (b.time - a.time) * (b.temperature - a.temperature)
            }
        })
    }

    /// Sample the spline from 0 to the last setpoint time inclusive with
    /// `floor(duration) + 1` evenly spaced points (1 s apart for whole-second
    /// durations).
    pub fn preview(&self) -> Result<PreviewCurve, ProfileError> {
        let spline = self.spline()?;
        let total = self.duration().unwrap_or(0.0);
        let samples = total.floor() as usize + 1;
        let time: Vec<f64> = if samples == 1 {
            vec![0.0]
        } else {
            let steps = (samples - 1) as f64;
            (0..samples).map(|k| total * k as f64 / steps).collect()
        };
        let target_temperature = time.iter().map(|&t| spline.evaluate(t)).collect();
        Ok(PreviewCurve {
            time,
            target_temperature,
        })
    }
}
