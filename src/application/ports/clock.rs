//! Time source port

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Injectable time source.
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock's origin
    fn now(&self) -> Duration;

    /// Wall-clock Unix time in milliseconds
    fn unix_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock advanced by hand, for deterministic animation and timing
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    unix_millis: i64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock value reported by `unix_millis` before any `advance`
    pub fn with_unix_millis(unix_millis: i64) -> Self {
        Self {
            now: Mutex::new(Duration::ZERO),
            unix_millis,
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unix_millis(&self) -> i64 {
        self.unix_millis + self.now().as_millis() as i64
    }
}
