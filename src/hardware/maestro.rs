//! Pololu Maestro servo controller, compact serial protocol.
//!
//! Every command is `command byte, channel, low 7 bits, high 7 bits`. Targets
//! are pulse widths in quarter-microseconds. The fan and the heater are both
//! driven through servo channels, so a command in [0, 1] maps linearly onto
//! the configured pulse range.

use serial2_tokio::SerialPort;
use tokio::sync::mpsc;

use super::HardwareError;
use crate::config::HardwareConfig;
use crate::plant::{Actuators, PlantError};

pub const SET_TARGET: u8 = 0x84;
pub const SET_SPEED: u8 = 0x87;
pub const SET_ACCELERATION: u8 = 0x89;

pub fn encode(command: u8, channel: u8, value: u16) -> [u8; 4] {
    [command, channel, (value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRange {
    pub min: u16,
    pub max: u16,
}

impl PulseRange {
    pub fn pulse_for(&self, fraction: f64) -> u16 {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let span = f64::from(self.max - self.min);
        self.min + (span * fraction).round() as u16
    }
}

/// Owns the servo port; frames queued on the returned sender are written in
/// order. The task ends when every sender is dropped or a write fails.
pub fn spawn_writer(port: SerialPort) -> mpsc::UnboundedSender<Vec<u8>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            tracing::trace!("Maestro TX: {:02x?}", frame);
            if let Err(e) = port.write_all(&frame).await {
                tracing::error!("Servo write failed: {}", e);
                break;
            }
        }
        tracing::info!("Servo writer stopped");
    });
    tx
}

pub struct MaestroActuators {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    fan_channel: u8,
    heater_channel: u8,
    range: PulseRange,
}

impl MaestroActuators {
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>, config: &HardwareConfig) -> Self {
        Self {
            tx,
            fan_channel: config.fan_channel,
            heater_channel: config.heater_channel,
            range: PulseRange {
                min: config.min_pulse,
                max: config.max_pulse,
            },
        }
    }

    /// Speed and acceleration limits for both channels.
    pub fn configure_channels(&self, config: &HardwareConfig) -> Result<(), HardwareError> {
        for channel in [self.fan_channel, self.heater_channel] {
            self.send(encode(SET_SPEED, channel, config.servo_speed))
                .map_err(|_| HardwareError::WriterClosed)?;
            self.send(encode(SET_ACCELERATION, channel, config.servo_acceleration))
                .map_err(|_| HardwareError::WriterClosed)?;
        }
        Ok(())
    }

    fn send(&self, frame: [u8; 4]) -> Result<(), PlantError> {
        self.tx
            .send(frame.to_vec())
            .map_err(|_| PlantError::Actuator("servo writer closed".to_string()))
    }

    fn set_channel(&self, channel: u8, fraction: f64) -> Result<(), PlantError> {
        let pulse = self.range.pulse_for(fraction);
        tracing::debug!("Servo channel {} -> {}", channel, pulse);
        self.send(encode(SET_TARGET, channel, pulse))
    }
}

impl Actuators for MaestroActuators {
    fn set_fan(&mut self, speed: f64) -> Result<(), PlantError> {
        self.set_channel(self.fan_channel, speed)
    }

    fn set_heater(&mut self, power: f64) -> Result<(), PlantError> {
        self.set_channel(self.heater_channel, power)
    }
}
