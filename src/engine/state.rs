// src/engine/state.rs - Roaster lifecycle states and outbound snapshots
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoastState {
    #[default]
    Idle,
    Preheating,
    Roasting,
    Completed,
}

impl RoastState {
    /// States in which the tick loop drives the plant.
    pub fn is_active(self) -> bool {
        matches!(self, RoastState::Preheating | RoastState::Roasting)
    }
}

impl fmt::Display for RoastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoastState::Idle => "idle",
            RoastState::Preheating => "preheating",
            RoastState::Roasting => "roasting",
            RoastState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Pushed to clients once per tick. Flags reflect the state after the tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoastSnapshot {
    /// Simulated seconds since roast start, or since preheat start while
    /// preheating.
    pub elapsed_time: f64,
    pub bean_temperature: f64,
    pub environment_temperature: f64,
    pub target_temperature: f64,
    pub fan_speed: f64,
    pub heating_power: f64,
    pub is_preheating: bool,
    pub is_roasting: bool,
    pub is_roast_completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: RoastState,
    pub profile: Profile,
    pub preheat_target: Option<f64>,
    pub roast_elapsed: Option<f64>,
    pub speed_up_factor: f64,
    pub last_snapshot: Option<RoastSnapshot>,
}
