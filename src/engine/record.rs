// src/engine/record.rs - Per-tick roast history and the persisted log row
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::profile::{Interpolation, Profile};

/// Timestamp format of the log `timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One row of history, appended every tick while roasting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoastRecord {
    pub timestamp: DateTime<Local>,
    pub bean_temperature: f64,
    pub environment_temperature: f64,
    pub fan_speed: f64,
    pub heating_power: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Time and temperature both reached the end of the profile.
    Completed,
    Stopped,
    Reset,
    /// Service shutdown or a fatal plant error.
    Aborted,
}

/// A roast that has left the Roasting state, ready to be persisted.
#[derive(Debug, Clone)]
pub struct FinishedRoast {
    pub profile: Profile,
    pub started_at: DateTime<Local>,
    pub speed_up_factor: f64,
    pub reason: FinishReason,
    pub records: Vec<RoastRecord>,
}

/// Persisted column order: timestamp, bean, environment, fan, heater, target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub timestamp: String,
    pub bean_temperature: f64,
    pub environment_temperature: f64,
    pub fan_speed: f64,
    pub heating_power: f64,
    pub target_temperature: f64,
}

impl FinishedRoast {
    /// Roast time of a record in simulated seconds.
    pub fn roast_time(&self, record: &RoastRecord) -> f64 {
        let wall = (record.timestamp - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        wall * self.speed_up_factor
    }

    /// Rows for the log file. The target column is recomputed with linear
    /// interpolation from each record's timestamp, not copied from the tick.
    pub fn log_rows(&self) -> Vec<LogRow> {
        self.records
            .iter()
            .map(|record| {
                let target_temperature = self
                    .profile
                    .target_temperature(self.roast_time(record), Interpolation::Linear)
                    .unwrap_or(f64::NAN);
                LogRow {
                    timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bean_temperature: record.bean_temperature,
                    environment_temperature: record.environment_temperature,
                    fan_speed: record.fan_speed,
                    heating_power: record.heating_power,
                    target_temperature,
                }
            })
            .collect()
    }
}
