// src/controller.rs - Proportional fan/heater controller
use serde::Serialize;

use crate::config::ControllerConfig;

/// Actuator commands for one tick, both in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ControlOutput {
    pub fan_speed: f64,
    pub heating_power: f64,
}

/// Proportional-only controller. No integral or derivative term, so the bean
/// settles a little below a flat target and overshoots on the way up a ramp.
#[derive(Debug, Clone, Copy)]
pub struct Controller {
    config: ControllerConfig,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    /// More airflow above target, heat only below it.
    pub fn compute(&self, target_temperature: f64, measured_temperature: f64) -> ControlOutput {
        let error = target_temperature - measured_temperature;
        ControlOutput {
            fan_speed: saturate(self.config.fan_bias - error * self.config.fan_gain),
            heating_power: saturate(error * self.config.heater_gain),
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

fn saturate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
