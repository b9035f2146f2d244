// src/plant/hardware.rs - Passthrough plant for the physical roaster
use super::{PlantError, PlantModel, PlantReading, clamp_unit};

/// Source of the latest bean/environment temperature pair.
pub trait TemperatureProbe: Send {
    fn latest(&self) -> Result<PlantReading, PlantError>;
}

/// Fan and heater outputs, both commanded in [0, 1].
pub trait Actuators: Send {
    fn set_fan(&mut self, speed: f64) -> Result<(), PlantError>;
    fn set_heater(&mut self, power: f64) -> Result<(), PlantError>;
}

pub struct HardwarePlant {
    probe: Box<dyn TemperatureProbe>,
    actuators: Box<dyn Actuators>,
}

impl HardwarePlant {
    pub fn new(probe: Box<dyn TemperatureProbe>, actuators: Box<dyn Actuators>) -> Self {
        Self { probe, actuators }
    }
}

impl PlantModel for HardwarePlant {
    fn read_temperature(&mut self) -> Result<PlantReading, PlantError> {
        self.probe.latest()
    }

    fn set_fan_speed(&mut self, speed: f64) -> Result<(), PlantError> {
        self.actuators.set_fan(clamp_unit(speed))
    }

    fn set_heating_power(&mut self, power: f64) -> Result<(), PlantError> {
        self.actuators.set_heater(clamp_unit(power))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FixedProbe(Option<PlantReading>);

    impl TemperatureProbe for FixedProbe {
        fn latest(&self) -> Result<PlantReading, PlantError> {
            self.0.ok_or(PlantError::NoReading)
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(&'static str, f64)>>>);

    impl Actuators for Recorder {
        fn set_fan(&mut self, speed: f64) -> Result<(), PlantError> {
            self.0.lock().unwrap().push(("fan", speed));
            Ok(())
        }
        fn set_heater(&mut self, power: f64) -> Result<(), PlantError> {
            self.0.lock().unwrap().push(("heater", power));
            Ok(())
        }
    }

    #[test]
    fn test_inputs_clamped_before_forwarding() {
        let recorder = Recorder::default();
        let mut plant = HardwarePlant::new(Box::new(FixedProbe(None)), Box::new(recorder.clone()));
        plant.set_fan_speed(1.7).unwrap();
        plant.set_heating_power(-0.2).unwrap();
        plant.set_heating_power(0.4).unwrap();
        assert_eq!(*recorder.0.lock().unwrap(), vec![("fan", 1.0), ("heater", 0.0), ("heater", 0.4)]);
    }

    #[test]
    fn test_read_passes_through() {
        let reading = PlantReading {
            bean_temperature: 180.0,
            environment_temperature: 230.0,
        };
        let mut plant = HardwarePlant::new(Box::new(FixedProbe(Some(reading))), Box::new(Recorder::default()));
        assert_eq!(plant.read_temperature().unwrap(), reading);

        let mut empty = HardwarePlant::new(Box::new(FixedProbe(None)), Box::new(Recorder::default()));
        assert_eq!(empty.read_temperature(), Err(PlantError::NoReading));
    }
}
