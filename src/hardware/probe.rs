// src/hardware/probe.rs - Serial temperature probe reader
use serial2_tokio::SerialPort;
use tokio::sync::watch;

use crate::plant::{PlantError, PlantReading, TemperatureProbe};

/// Parse one `bean,env` line. Anything else is ignored by the reader.
pub fn parse_probe_line(line: &str) -> Option<PlantReading> {
    let (bean, env) = line.trim().split_once(',')?;
    let bean_temperature: f64 = bean.trim().parse().ok()?;
    let environment_temperature: f64 = env.trim().parse().ok()?;
    if !bean_temperature.is_finite() || !environment_temperature.is_finite() {
        return None;
    }
    Some(PlantReading {
        bean_temperature,
        environment_temperature,
    })
}

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }
}

/// Latest probe sample, fed by a background reader task.
pub struct WatchProbe {
    rx: watch::Receiver<Option<PlantReading>>,
}

impl WatchProbe {
    pub fn new(rx: watch::Receiver<Option<PlantReading>>) -> Self {
        Self { rx }
    }

    pub fn spawn(port: SerialPort) -> Self {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            let mut lines = LineBuffer::default();
            let mut buf = [0u8; 256];
            loop {
                match port.read(&mut buf).await {
                    Ok(0) => {
                        tracing::info!("Probe connection closed");
                        break;
                    }
                    Ok(n) => {
                        for line in lines.push(&buf[..n]) {
                            match parse_probe_line(&line) {
                                Some(reading) => {
                                    tracing::trace!("Probe RX: {}", line);
                                    if tx.send(Some(reading)).is_err() {
                                        return;
                                    }
                                }
                                None => tracing::warn!("Ignoring probe line {:?}", line),
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        tracing::error!("Probe read error: {}", e);
                        break;
                    }
                }
            }
        });
        Self::new(rx)
    }
}

impl TemperatureProbe for WatchProbe {
    fn latest(&self) -> Result<PlantReading, PlantError> {
        // has_changed only fails once the reader task has dropped its sender.
        if self.rx.has_changed().is_err() {
            return Err(PlantError::Sensor("probe reader stopped".to_string()));
        }
        (*self.rx.borrow()).ok_or(PlantError::NoReading)
    }
}
