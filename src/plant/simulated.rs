// src/plant/simulated.rs - Lumped thermal model of the roasting chamber
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::{PlantError, PlantModel, PlantReading, clamp_unit};
use crate::config::SimulationConfig;
use crate::scheduler::TimeSource;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlantState {
    pub bean_temperature: f64,
    pub environment_temperature: f64,
    pub fan_speed: f64,
    pub heating_power: f64,
    /// Heater output after the actuator lag.
    pub current_heating_power: f64,
}

/// Chamber air heated by a lagged heater and cooled super-linearly above
/// ambient, with the beans trailing the air temperature.
///
/// The model only advances when read: each read integrates the wall-clock
/// time since the previous read, scaled by the speed-up factor.
pub struct SimulatedPlant {
    config: SimulationConfig,
    clock: Arc<dyn TimeSource>,
    speed_up_factor: f64,
    state: PlantState,
    last_update: Instant,
    noise: Option<StdRng>,
}

impl SimulatedPlant {
    pub fn new(config: SimulationConfig, clock: Arc<dyn TimeSource>, speed_up_factor: f64) -> Self {
        let ambient = config.ambient_temperature;
        let noise = (config.sensor_noise > 0.0).then(StdRng::from_os_rng);
        let last_update = clock.now_monotonic();
        tracing::info!(
            "Simulated plant at {:.1}° ambient, speed-up {}x",
            ambient,
            speed_up_factor
        );
        Self {
            config,
            clock,
            speed_up_factor,
            state: PlantState {
                bean_temperature: ambient,
                environment_temperature: ambient,
                fan_speed: 0.0,
                heating_power: 0.0,
                current_heating_power: 0.0,
            },
            last_update,
            noise,
        }
    }

    /// Reproducible sensor noise for tests and the offline harness.
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        if self.config.sensor_noise > 0.0 {
            self.noise = Some(StdRng::seed_from_u64(seed));
        }
        self
    }

    pub fn state(&self) -> &PlantState {
        &self.state
    }

    fn advance(&mut self) {
        let now = self.clock.now_monotonic();
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64() * self.speed_up_factor;
        self.last_update = now;
        if elapsed <= 0.0 {
            return;
        }
        let cfg = &self.config;
        let s = &mut self.state;

        s.current_heating_power +=
            (s.heating_power - s.current_heating_power) * elapsed / cfg.heating_lag_seconds;
        s.current_heating_power = clamp_unit(s.current_heating_power);

        let heating_effect = s.current_heating_power * cfg.heating_efficiency * elapsed;
        let cooling_factor = ((s.environment_temperature - cfg.ambient_temperature) / 100.0).exp() - 1.0;
        let cooling_effect = (cooling_factor * (1.0 + s.fan_speed)).min(cfg.max_cooling_rate) * elapsed;
        s.environment_temperature += heating_effect - cooling_effect;

        s.bean_temperature +=
            (s.environment_temperature - s.bean_temperature) * cfg.bean_transfer_rate * elapsed;

        s.environment_temperature = s.environment_temperature.max(cfg.ambient_temperature);
        s.bean_temperature = s.bean_temperature.max(cfg.ambient_temperature);
    }

    fn jitter(&mut self) -> f64 {
        let half = self.config.sensor_noise / 2.0;
        match self.noise.as_mut() {
            Some(rng) => rng.random_range(-half..=half),
            None => 0.0,
        }
    }
}

impl PlantModel for SimulatedPlant {
    fn read_temperature(&mut self) -> Result<PlantReading, PlantError> {
        self.advance();
        let bean_temperature = self.state.bean_temperature + self.jitter();
        let environment_temperature = self.state.environment_temperature + self.jitter();
        Ok(PlantReading {
            bean_temperature,
            environment_temperature,
        })
    }

    fn set_fan_speed(&mut self, speed: f64) -> Result<(), PlantError> {
        self.state.fan_speed = clamp_unit(speed);
        Ok(())
    }

    fn set_heating_power(&mut self, power: f64) -> Result<(), PlantError> {
        self.state.heating_power = clamp_unit(power);
        Ok(())
    }
}
