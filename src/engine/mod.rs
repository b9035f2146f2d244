//! The roast state machine.
//!
//! [`RoastEngine`] owns the plant, the controller and the current profile.
//! Commands move it between [`RoastState`]s; [`RoastEngine::tick`] runs one
//! control step while preheating or roasting. The engine never sleeps and
//! never touches storage: the caller decides when to tick and what to do with
//! a [`FinishedRoast`].

pub mod record;
pub mod state;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::controller::{ControlOutput, Controller};
use crate::plant::{Plant, PlantError, PlantModel};
use crate::profile::{NaturalCubicSpline, PreviewCurve, Profile, ProfileError};
use crate::scheduler::TimeSource;

pub use record::{FinishReason, FinishedRoast, LogRow, RoastRecord};
pub use state::{EngineStatus, RoastSnapshot, RoastState};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    InvalidProfile(#[from] ProfileError),
    #[error("Current profile has no setpoints")]
    NoSetpoints,
    #[error("Roaster must be preheated before starting a roast")]
    NotPreheated,
    #[error("A roast is already in progress")]
    AlreadyRoasting,
    #[error("Cannot do that while a roast is in progress")]
    RoastInProgress,
    #[error("Plant failure: {0}")]
    Plant(#[from] PlantError),
}

impl EngineError {
    /// Rejected state transitions, as opposed to bad input or plant failures.
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            EngineError::NoSetpoints
                | EngineError::NotPreheated
                | EngineError::AlreadyRoasting
                | EngineError::RoastInProgress
        )
    }
}

/// Response to a successful roast start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoastStart {
    pub message: String,
    pub profile: PreviewCurve,
}

#[derive(Debug)]
pub enum StopOutcome {
    Stopped(FinishedRoast),
    NoRoastInProgress,
}

#[derive(Debug)]
pub struct TickOutcome {
    pub snapshot: RoastSnapshot,
    /// Set on the tick that completed the roast.
    pub finished: Option<FinishedRoast>,
}

struct ActiveRoast {
    started: Instant,
    started_at: DateTime<Local>,
    spline: NaturalCubicSpline,
    records: Vec<RoastRecord>,
}

pub struct RoastEngine {
    plant: Plant,
    controller: Controller,
    clock: Arc<dyn TimeSource>,
    speed_up_factor: f64,
    state: RoastState,
    profile: Profile,
    preheat: Option<(Instant, f64)>,
    roast: Option<ActiveRoast>,
    last_snapshot: Option<RoastSnapshot>,
}

impl RoastEngine {
    /// Starts Idle with `profile` as the current profile.
    pub fn new(
        plant: Plant,
        controller: Controller,
        clock: Arc<dyn TimeSource>,
        speed_up_factor: f64,
        profile: Profile,
    ) -> Self {
        tracing::info!(
            "Roast engine ready ({} plant, speed-up {}x)",
            plant.kind(),
            speed_up_factor
        );
        Self {
            plant,
            controller,
            clock,
            speed_up_factor,
            state: RoastState::Idle,
            profile,
            preheat: None,
            roast: None,
            last_snapshot: None,
        }
    }

    pub fn state(&self) -> RoastState {
        self.state
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            profile: self.profile.clone(),
            preheat_target: self.preheat.map(|(_, target)| target),
            roast_elapsed: self.roast.as_ref().map(|r| self.scaled_since(r.started)),
            speed_up_factor: self.speed_up_factor,
            last_snapshot: self.last_snapshot,
        }
    }

    /// Heat toward the first setpoint of the current profile.
    pub fn start_preheat(&mut self) -> Result<f64, EngineError> {
        if self.state == RoastState::Roasting {
            return Err(EngineError::RoastInProgress);
        }
        let target = self.profile.first().ok_or(EngineError::NoSetpoints)?.temperature;
        self.preheat = Some((self.clock.now_monotonic(), target));
        self.state = RoastState::Preheating;
        tracing::info!("Preheating to {:.1}°", target);
        Ok(target)
    }

    pub fn start_roast(&mut self, profile: Profile) -> Result<RoastStart, EngineError> {
        match self.state {
            RoastState::Roasting => return Err(EngineError::AlreadyRoasting),
            RoastState::Idle | RoastState::Completed => return Err(EngineError::NotPreheated),
            RoastState::Preheating => {}
        }
        profile.validate()?;
        let preview = profile.preview()?;
        let spline = profile.spline()?;

        self.roast = Some(ActiveRoast {
            started: self.clock.now_monotonic(),
            started_at: self.clock.now_wallclock(),
            spline,
            records: Vec::new(),
        });
        tracing::info!(
            "Roast started: {} setpoints over {:.0}s",
            profile.setpoints.len(),
            profile.duration().unwrap_or(0.0)
        );
        self.profile = profile;
        self.preheat = None;
        self.state = RoastState::Roasting;
        Ok(RoastStart {
            message: "Roast started".to_string(),
            profile: preview,
        })
    }

    pub fn stop_roast(&mut self) -> StopOutcome {
        if self.state != RoastState::Roasting {
            tracing::debug!("Stop requested with no roast in progress");
            return StopOutcome::NoRoastInProgress;
        }
        match self.finish(FinishReason::Stopped) {
            Some(roast) => StopOutcome::Stopped(roast),
            None => StopOutcome::NoRoastInProgress,
        }
    }

    /// Back to Idle from any state. A roast in progress is finalized and
    /// returned so its history can still be saved.
    pub fn reset(&mut self) -> Option<FinishedRoast> {
        let finished = if self.state == RoastState::Roasting {
            self.finish(FinishReason::Reset)
        } else {
            if self.state == RoastState::Preheating {
                self.heater_off();
            }
            None
        };
        self.state = RoastState::Idle;
        self.preheat = None;
        self.last_snapshot = None;
        tracing::info!("Roaster reset");
        finished
    }

    /// Finalize whatever roast is in progress without a state change request.
    /// Used when the owning session ends.
    pub fn abort(&mut self) -> Option<FinishedRoast> {
        match self.state {
            RoastState::Roasting => self.finish(FinishReason::Aborted),
            RoastState::Preheating => {
                self.heater_off();
                None
            }
            _ => None,
        }
    }

    /// Replace the current profile outside a roast. While preheating, the
    /// preheat target follows the new first setpoint.
    pub fn load_profile(&mut self, profile: Profile) -> Result<(), EngineError> {
        if self.state == RoastState::Roasting {
            return Err(EngineError::RoastInProgress);
        }
        profile.validate_order()?;
        if let Some((started, _)) = self.preheat {
            let target = profile.first().ok_or(EngineError::NoSetpoints)?.temperature;
            self.preheat = Some((started, target));
        }
        tracing::info!("Loaded profile with {} setpoints", profile.setpoints.len());
        self.profile = profile;
        Ok(())
    }

    /// One control step. Returns `None` when neither preheating nor roasting.
    /// A plant error leaves the state untouched and is fatal to the caller's
    /// session.
    pub fn tick(&mut self) -> Result<Option<TickOutcome>, EngineError> {
        if !self.state.is_active() {
            return Ok(None);
        }
        let reading = self.plant.read_temperature()?;

        let (elapsed_time, target_temperature) = match (&self.roast, self.preheat) {
            (Some(roast), _) => {
                let elapsed = self.scaled_since(roast.started);
                (elapsed, roast.spline.evaluate(elapsed))
            }
            (None, Some((started, target))) => (self.scaled_since(started), target),
            (None, None) => return Ok(None),
        };

        let ControlOutput {
            fan_speed,
            heating_power,
        } = self.controller.compute(target_temperature, reading.bean_temperature);
        self.plant.set_fan_speed(fan_speed)?;
        self.plant.set_heating_power(heating_power)?;

        let mut finished = None;
        if let Some(roast) = self.roast.as_mut() {
            roast.records.push(RoastRecord {
                timestamp: self.clock.now_wallclock(),
                bean_temperature: reading.bean_temperature,
                environment_temperature: reading.environment_temperature,
                fan_speed,
                heating_power,
            });
            let end = self.profile.duration().unwrap_or(0.0);
            if elapsed_time >= end && reading.bean_temperature >= target_temperature {
                tracing::info!(
                    "Roast complete at {:.1}s, bean {:.1}° (target {:.1}°)",
                    elapsed_time,
                    reading.bean_temperature,
                    target_temperature
                );
                finished = self.finish(FinishReason::Completed);
            }
        }

        let snapshot = RoastSnapshot {
            elapsed_time,
            bean_temperature: reading.bean_temperature,
            environment_temperature: reading.environment_temperature,
            target_temperature,
            fan_speed,
            heating_power,
            is_preheating: self.state == RoastState::Preheating,
            is_roasting: self.state == RoastState::Roasting,
            is_roast_completed: self.state == RoastState::Completed,
        };
        tracing::debug!(
            "tick t={:.1} bean={:.1} env={:.1} target={:.1} fan={:.2} heat={:.2}",
            elapsed_time,
            reading.bean_temperature,
            reading.environment_temperature,
            target_temperature,
            fan_speed,
            heating_power
        );
        self.last_snapshot = Some(snapshot);
        Ok(Some(TickOutcome { snapshot, finished }))
    }

    fn finish(&mut self, reason: FinishReason) -> Option<FinishedRoast> {
        let roast = self.roast.take()?;
        self.state = RoastState::Completed;
        self.heater_off();
        tracing::info!("Roast finished ({:?}) with {} records", reason, roast.records.len());
        Some(FinishedRoast {
            profile: self.profile.clone(),
            started_at: roast.started_at,
            speed_up_factor: self.speed_up_factor,
            reason,
            records: roast.records,
        })
    }

    fn heater_off(&mut self) {
        if let Err(e) = self.plant.set_heating_power(0.0) {
            tracing::warn!("Failed to switch heater off: {}", e);
        }
    }

    fn scaled_since(&self, since: Instant) -> f64 {
        self.clock
            .now_monotonic()
            .saturating_duration_since(since)
            .as_secs_f64()
            * self.speed_up_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerConfig, SimulationConfig};
    use crate::plant::SimulatedPlant;
    use crate::profile::Setpoint;
    use crate::scheduler::ManualClock;
    use std::time::Duration;

    fn engine() -> (Arc<ManualClock>, RoastEngine) {
        let clock = Arc::new(ManualClock::new());
        let plant = SimulatedPlant::new(SimulationConfig::default(), clock.clone(), 1.0);
        let engine = RoastEngine::new(
            plant.into(),
            Controller::new(ControllerConfig::default()),
            clock.clone(),
            1.0,
            Profile::constant(200.0),
        );
        (clock, engine)
    }

    fn ramp() -> Profile {
        Profile::new(vec![Setpoint::new(0.0, 200.0), Setpoint::new(60.0, 220.0)]).unwrap()
    }

    #[test]
    fn test_idle_rejects_roast_start() {
        let (_clock, mut engine) = engine();
        assert_eq!(engine.start_roast(ramp()).unwrap_err(), EngineError::NotPreheated);
        assert_eq!(engine.state(), RoastState::Idle);
    }

    #[test]
    fn test_preheat_then_roast() {
        let (_clock, mut engine) = engine();
        assert_eq!(engine.start_preheat().unwrap(), 200.0);
        assert_eq!(engine.state(), RoastState::Preheating);

        let start = engine.start_roast(ramp()).unwrap();
        assert_eq!(start.message, "Roast started");
        assert_eq!(start.profile.time.len(), 61);
        assert_eq!(start.profile.target_temperature[60], 220.0);
        assert_eq!(engine.state(), RoastState::Roasting);
        assert!(engine.status().preheat_target.is_none());

        assert_eq!(engine.start_preheat().unwrap_err(), EngineError::RoastInProgress);
        assert_eq!(engine.start_roast(ramp()).unwrap_err(), EngineError::AlreadyRoasting);
        assert_eq!(engine.load_profile(ramp()).unwrap_err(), EngineError::RoastInProgress);
    }

    #[test]
    fn test_invalid_profile_keeps_preheating() {
        let (_clock, mut engine) = engine();
        engine.start_preheat().unwrap();
        let err = engine.start_roast(Profile::default()).unwrap_err();
        assert_eq!(err, EngineError::InvalidProfile(ProfileError::Empty));
        assert_eq!(engine.state(), RoastState::Preheating);
    }

    #[test]
    fn test_preheat_needs_setpoints() {
        let (_clock, mut engine) = engine();
        engine.load_profile(Profile::default()).unwrap();
        assert_eq!(engine.start_preheat().unwrap_err(), EngineError::NoSetpoints);
        assert_eq!(engine.state(), RoastState::Idle);
    }

    #[test]
    fn test_stop_without_roast_is_noop() {
        let (_clock, mut engine) = engine();
        assert!(matches!(engine.stop_roast(), StopOutcome::NoRoastInProgress));
        engine.start_preheat().unwrap();
        assert!(matches!(engine.stop_roast(), StopOutcome::NoRoastInProgress));
        assert_eq!(engine.state(), RoastState::Preheating);
    }

    #[test]
    fn test_tick_idle_does_nothing() {
        let (_clock, mut engine) = engine();
        assert!(engine.tick().unwrap().is_none());
    }

    #[test]
    fn test_preheat_tick_targets_first_setpoint() {
        let (clock, mut engine) = engine();
        engine.start_preheat().unwrap();
        clock.advance(Duration::from_secs(1));
        let outcome = engine.tick().unwrap().unwrap();
        assert_eq!(outcome.snapshot.target_temperature, 200.0);
        assert_eq!(outcome.snapshot.heating_power, 1.0);
        assert!(outcome.snapshot.is_preheating);
        assert!(!outcome.snapshot.is_roasting);
        assert!(outcome.finished.is_none());
    }

    #[test]
    fn test_stop_returns_history() {
        let (clock, mut engine) = engine();
        engine.start_preheat().unwrap();
        engine.start_roast(ramp()).unwrap();
        for _ in 0..5 {
            clock.advance(Duration::from_secs(1));
            engine.tick().unwrap();
        }
        let StopOutcome::Stopped(roast) = engine.stop_roast() else {
            panic!("expected a stopped roast");
        };
        assert_eq!(roast.records.len(), 5);
        assert_eq!(roast.reason, FinishReason::Stopped);
        assert_eq!(roast.profile, ramp());
        assert_eq!(engine.state(), RoastState::Completed);
        // Completed ticks nothing and needs a new preheat to roast again.
        assert!(engine.tick().unwrap().is_none());
        assert_eq!(engine.start_roast(ramp()).unwrap_err(), EngineError::NotPreheated);
    }

    #[test]
    fn test_reset_mid_roast_finalizes() {
        let (clock, mut engine) = engine();
        engine.start_preheat().unwrap();
        engine.start_roast(ramp()).unwrap();
        clock.advance(Duration::from_secs(1));
        engine.tick().unwrap();
        let roast = engine.reset().unwrap();
        assert_eq!(roast.reason, FinishReason::Reset);
        assert_eq!(roast.records.len(), 1);
        assert_eq!(engine.state(), RoastState::Idle);
        assert!(engine.reset().is_none());
    }

    #[test]
    fn test_load_profile_retargets_preheat() {
        let (_clock, mut engine) = engine();
        engine.start_preheat().unwrap();
        engine.load_profile(ramp()).unwrap();
        assert_eq!(engine.status().preheat_target, Some(200.0));
        engine
            .load_profile(Profile::new(vec![Setpoint::new(0.0, 180.0)]).unwrap())
            .unwrap();
        assert_eq!(engine.status().preheat_target, Some(180.0));
    }

    #[test]
    fn test_plant_failure_propagates() {
        use crate::plant::{Actuators, HardwarePlant, PlantReading, TemperatureProbe};

        struct Silent;
        impl TemperatureProbe for Silent {
            fn latest(&self) -> Result<PlantReading, PlantError> {
                Err(PlantError::Sensor("unplugged".to_string()))
            }
        }
        struct Sink;
        impl Actuators for Sink {
            fn set_fan(&mut self, _: f64) -> Result<(), PlantError> {
                Ok(())
            }
            fn set_heater(&mut self, _: f64) -> Result<(), PlantError> {
                Ok(())
            }
        }

        let clock = Arc::new(ManualClock::new());
        let mut engine = RoastEngine::new(
            HardwarePlant::new(Box::new(Silent), Box::new(Sink)).into(),
            Controller::default(),
            clock,
            1.0,
            Profile::constant(200.0),
        );
        engine.start_preheat().unwrap();
        let err = engine.tick().unwrap_err();
        assert!(matches!(err, EngineError::Plant(PlantError::Sensor(_))));
        assert_eq!(engine.state(), RoastState::Preheating);
    }
}
