//! Clocks and tick pacing for the roast loop.

pub mod time_source;

use std::time::Duration;

use crate::config::PlantMode;

pub use time_source::{ManualClock, SystemClock, TimeSource};

/// Wall-clock period between control ticks.
///
/// The simulated plant advances one simulated second per tick, so the period
/// shrinks with the speed-up factor. Real hardware is always ticked once a
/// second.
pub fn tick_interval(mode: PlantMode, speed_up_factor: f64) -> Duration {
    match mode {
        PlantMode::Simulated if speed_up_factor > 0.0 => Duration::from_secs_f64(1.0 / speed_up_factor),
        _ => Duration::from_secs(1),
    }
}
