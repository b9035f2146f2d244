//! The thing being controlled: a simulated thermal model or the real roaster.
//!
//! Both variants expose the same three capabilities through [`PlantModel`].
//! The variant is chosen once at startup and wrapped in [`Plant`].

pub mod hardware;
pub mod simulated;

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, PlantMode};
use crate::hardware::HardwareError;
use crate::scheduler::TimeSource;

pub use hardware::{Actuators, HardwarePlant, TemperatureProbe};
pub use simulated::{PlantState, SimulatedPlant};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlantError {
    #[error("No temperature reading available yet")]
    NoReading,
    #[error("Sensor error: {0}")]
    Sensor(String),
    #[error("Actuator error: {0}")]
    Actuator(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlantReading {
    pub bean_temperature: f64,
    pub environment_temperature: f64,
}

pub trait PlantModel: Send {
    fn read_temperature(&mut self) -> Result<PlantReading, PlantError>;
    /// Values outside [0, 1] are clamped.
    fn set_fan_speed(&mut self, speed: f64) -> Result<(), PlantError>;
    /// Values outside [0, 1] are clamped.
    fn set_heating_power(&mut self, power: f64) -> Result<(), PlantError>;
}

pub enum Plant {
    Simulated(SimulatedPlant),
    Hardware(HardwarePlant),
}

impl Plant {
    pub fn kind(&self) -> &'static str {
        match self {
            Plant::Simulated(_) => "simulated",
            Plant::Hardware(_) => "hardware",
        }
    }
}

impl PlantModel for Plant {
    fn read_temperature(&mut self) -> Result<PlantReading, PlantError> {
        match self {
            Plant::Simulated(plant) => plant.read_temperature(),
            Plant::Hardware(plant) => plant.read_temperature(),
        }
    }

    fn set_fan_speed(&mut self, speed: f64) -> Result<(), PlantError> {
        match self {
            Plant::Simulated(plant) => plant.set_fan_speed(speed),
            Plant::Hardware(plant) => plant.set_fan_speed(speed),
        }
    }

    fn set_heating_power(&mut self, power: f64) -> Result<(), PlantError> {
        match self {
            Plant::Simulated(plant) => plant.set_heating_power(power),
            Plant::Hardware(plant) => plant.set_heating_power(power),
        }
    }
}

impl From<SimulatedPlant> for Plant {
    fn from(plant: SimulatedPlant) -> Self {
        Plant::Simulated(plant)
    }
}

impl From<HardwarePlant> for Plant {
    fn from(plant: HardwarePlant) -> Self {
        Plant::Hardware(plant)
    }
}

/// Build the plant selected by `[roaster] mode`. Hardware mode opens the
/// serial ports, so it has to run inside a tokio runtime.
pub fn build(config: &Config, clock: Arc<dyn TimeSource>) -> Result<Plant, HardwareError> {
    match config.roaster.mode {
        PlantMode::Simulated => Ok(SimulatedPlant::new(
            config.simulation.clone(),
            clock,
            config.roaster.effective_speed_up(),
        )
        .into()),
        PlantMode::Hardware => {
            let hardware = config.hardware.as_ref().ok_or(HardwareError::NotConfigured)?;
            Ok(crate::hardware::connect(hardware)?.into())
        }
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
