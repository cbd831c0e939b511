//! Clock abstraction for deterministic testing.
//!
//! Production code uses `SystemClock` (real time).
//! Tests and the simulator use `ManualClock`, advanced frame by frame.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Trait abstracting time sources for testability.
pub trait Clock: Send + Sync {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future).
    fn millis_since(&self, earlier: Instant) -> f64 {
        duration_ms(self.now().saturating_duration_since(earlier))
    }
}

/// Convert a duration to fractional milliseconds.
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Milliseconds between two instants, saturating at zero.
pub fn elapsed_ms(later: Instant, earlier: Instant) -> f64 {
    duration_ms(later.saturating_duration_since(earlier))
}

/// Production clock using real monotonic time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    origin: Instant,
    instant: Mutex<Instant>,
}

impl ManualClock {
    /// Create a manual clock pinned at the current real instant.
    pub fn new() -> Self {
        let origin = Instant::now();
        Self {
            origin,
            instant: Mutex::new(origin),
        }
    }

    /// Advance time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut inst = self.instant.lock().unwrap();
        *inst += duration;
    }

    /// Advance time by whole milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Milliseconds advanced since construction.
    pub fn elapsed_ms(&self) -> f64 {
        elapsed_ms(self.now(), self.origin)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.instant.lock().unwrap()
    }
}
