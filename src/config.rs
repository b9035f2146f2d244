//! # Roaster Configuration
//!
//! Everything the host needs to start: plant selection, simulation constants,
//! controller gains, storage directories, web bind address and the serial
//! hardware settings.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [roaster]
//! mode = "simulated"
//! speed_up_factor = 5.0
//!
//! [simulation]
//! ambient_temperature = 22.0
//! heating_efficiency = 25.0
//!
//! [storage]
//! roast_logs_dir = "roast_logs"
//! profiles_dir = "profiles"
//! ```
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the roaster, simulation, controller, storage and web.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub roaster: RoasterConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub hardware: Option<HardwareConfig>,
}

/// Which plant implementation drives the roast.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlantMode {
    #[default]
    Simulated,
    Hardware,
}

/// Roaster-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoasterConfig {
    #[serde(default)]
    pub mode: PlantMode,
    /// Simulated seconds per wall-clock second. Ignored on hardware.
    #[serde(default = "default_speed_up_factor")]
    pub speed_up_factor: f64,
    /// Temperature of the one-point profile the roaster starts with.
    #[serde(default = "default_preheat_temperature")]
    pub default_preheat_temperature: f64,
}

impl Default for RoasterConfig {
    fn default() -> Self {
        Self {
            mode: PlantMode::default(),
            speed_up_factor: default_speed_up_factor(),
            default_preheat_temperature: default_preheat_temperature(),
        }
    }
}

impl RoasterConfig {
    /// Speed-up factor actually applied; real hardware always runs at 1x.
    pub fn effective_speed_up(&self) -> f64 {
        match self.mode {
            PlantMode::Simulated => self.speed_up_factor,
            PlantMode::Hardware => 1.0,
        }
    }
}

/// Thermal model constants for the simulated plant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_ambient_temperature")]
    pub ambient_temperature: f64,
    #[serde(default = "default_heating_lag_seconds")]
    pub heating_lag_seconds: f64,
    /// Degrees per second added to the chamber at full effective power.
    #[serde(default = "default_heating_efficiency")]
    pub heating_efficiency: f64,
    /// Upper bound on chamber cooling, degrees per second.
    #[serde(default = "default_max_cooling_rate")]
    pub max_cooling_rate: f64,
    #[serde(default = "default_bean_transfer_rate")]
    pub bean_transfer_rate: f64,
    /// Peak-to-peak uniform noise on reported temperatures. 0 disables it.
    #[serde(default)]
    pub sensor_noise: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ambient_temperature: default_ambient_temperature(),
            heating_lag_seconds: default_heating_lag_seconds(),
            heating_efficiency: default_heating_efficiency(),
            max_cooling_rate: default_max_cooling_rate(),
            bean_transfer_rate: default_bean_transfer_rate(),
            sensor_noise: 0.0,
        }
    }
}

/// Proportional gains of the fan/heater controller.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct ControllerConfig {
    #[serde(default = "default_fan_bias")]
    pub fan_bias: f64,
    #[serde(default = "default_fan_gain")]
    pub fan_gain: f64,
    #[serde(default = "default_heater_gain")]
    pub heater_gain: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            fan_bias: default_fan_bias(),
            fan_gain: default_fan_gain(),
            heater_gain: default_heater_gain(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_roast_logs_dir")]
    pub roast_logs_dir: PathBuf,
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            roast_logs_dir: default_roast_logs_dir(),
            profiles_dir: default_profiles_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// Serial hardware: a Maestro servo controller for fan and heater, and a
/// probe board streaming `bean,env` lines.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareConfig {
    pub servo_serial: String,
    #[serde(default = "default_servo_baud")]
    pub servo_baud: u32,
    #[serde(default = "default_fan_channel")]
    pub fan_channel: u8,
    #[serde(default = "default_heater_channel")]
    pub heater_channel: u8,
    /// Pulse widths in quarter-microseconds.
    #[serde(default = "default_min_pulse")]
    pub min_pulse: u16,
    #[serde(default = "default_max_pulse")]
    pub max_pulse: u16,
    #[serde(default = "default_servo_speed")]
    pub servo_speed: u16,
    #[serde(default = "default_servo_acceleration")]
    pub servo_acceleration: u16,
    pub probe_serial: String,
    #[serde(default = "default_probe_baud")]
    pub probe_baud: u32,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.roaster.speed_up_factor.is_finite() && self.roaster.speed_up_factor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "speed_up_factor must be > 0, got {}",
                self.roaster.speed_up_factor
            )));
        }
        if self.simulation.heating_lag_seconds <= 0.0 {
            return Err(ConfigError::Invalid("heating_lag_seconds must be > 0".to_string()));
        }
        if self.simulation.max_cooling_rate < 0.0 || self.simulation.sensor_noise < 0.0 {
            return Err(ConfigError::Invalid(
                "max_cooling_rate and sensor_noise must not be negative".to_string(),
            ));
        }
        if self.roaster.mode == PlantMode::Hardware {
            let Some(hw) = &self.hardware else {
                return Err(ConfigError::Invalid(
                    "mode = \"hardware\" requires a [hardware] section".to_string(),
                ));
            };
            if hw.min_pulse >= hw.max_pulse {
                return Err(ConfigError::Invalid(format!(
                    "min_pulse ({}) must be below max_pulse ({})",
                    hw.min_pulse, hw.max_pulse
                )));
            }
            if hw.fan_channel == hw.heater_channel {
                return Err(ConfigError::Invalid("fan and heater share a servo channel".to_string()));
            }
        }
        Ok(())
    }
}

fn default_speed_up_factor() -> f64 { 1.0 }
fn default_preheat_temperature() -> f64 { 200.0 }
fn default_ambient_temperature() -> f64 { 25.0 }
fn default_heating_lag_seconds() -> f64 { 3.0 }
fn default_heating_efficiency() -> f64 { 25.0 }
fn default_max_cooling_rate() -> f64 { 5.0 }
fn default_bean_transfer_rate() -> f64 { 0.1 }
fn default_fan_bias() -> f64 { 0.5 }
fn default_fan_gain() -> f64 { 0.02 }
fn default_heater_gain() -> f64 { 0.05 }
fn default_roast_logs_dir() -> PathBuf { PathBuf::from("roast_logs") }
fn default_profiles_dir() -> PathBuf { PathBuf::from("profiles") }
fn default_bind() -> String { "0.0.0.0:8000".to_string() }
fn default_servo_baud() -> u32 { 9600 }
fn default_fan_channel() -> u8 { 2 }
fn default_heater_channel() -> u8 { 1 }
fn default_min_pulse() -> u16 { 4000 }
fn default_max_pulse() -> u16 { 8000 }
fn default_servo_speed() -> u16 { 10 }
fn default_servo_acceleration() -> u16 { 4 }
fn default_probe_baud() -> u32 { 115200 }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}
