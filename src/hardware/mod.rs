// src/hardware/mod.rs - Serial drivers for the physical roaster
pub mod maestro;
pub mod probe;

use serial2_tokio::SerialPort;
use thiserror::Error;

use crate::config::HardwareConfig;
use crate::plant::HardwarePlant;

pub use maestro::MaestroActuators;
pub use probe::WatchProbe;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("Serial port error on {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Servo writer closed")]
    WriterClosed,
    #[error("mode = \"hardware\" needs a [hardware] section")]
    NotConfigured,
}

fn open_port(path: &str, baud: u32) -> Result<SerialPort, HardwareError> {
    tracing::info!("Opening {} at {} baud", path, baud);
    SerialPort::open(path, baud).map_err(|source| HardwareError::Serial {
        port: path.to_string(),
        source,
    })
}

/// Open the servo controller and the probe, start their IO tasks and wrap
/// both in a plant. Must be called from inside a tokio runtime.
pub fn connect(config: &HardwareConfig) -> Result<HardwarePlant, HardwareError> {
    let servo = open_port(&config.servo_serial, config.servo_baud)?;
    let actuators = MaestroActuators::new(maestro::spawn_writer(servo), config);
    actuators.configure_channels(config)?;

    let probe_port = open_port(&config.probe_serial, config.probe_baud)?;
    let probe = WatchProbe::spawn(probe_port);

    tracing::info!(
        "Hardware connected: fan on channel {}, heater on channel {}",
        config.fan_channel,
        config.heater_channel
    );
    Ok(HardwarePlant::new(Box::new(probe), Box::new(actuators)))
}
