use chrono::{DateTime, Local};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Clock shared by the engine and the simulated plant.
pub trait TimeSource: Send + Sync {
    fn now_monotonic(&self) -> Instant;
    fn now_wallclock(&self) -> DateTime<Local>;
}

/// Real clock. Monotonic time goes through tokio so a paused test runtime
/// also pauses the roaster.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    origin_wall: DateTime<Local>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now().into_std(),
            origin_wall: Local::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now_monotonic(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn now_wallclock(&self) -> DateTime<Local> {
        let elapsed = self.now_monotonic().saturating_duration_since(self.origin);
        self.origin_wall + chrono::Duration::from_std(elapsed).unwrap_or_default()
    }
}

/// Clock that only moves when told to. Used by the offline harness and tests.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_wall: DateTime<Local>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_wall: Local::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn now_monotonic(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn now_wallclock(&self) -> DateTime<Local> {
        self.origin_wall + chrono::Duration::from_std(self.elapsed()).unwrap_or_default()
    }
}
