//! Time sources used by the input drivers.

use std::fmt::Debug;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// A monotonic time source with a blocking delay.
///
/// Drivers take the clock as a trait object so the timing of their state machines
/// can be driven by hand.
pub trait Clock: Debug {
    /// Gets the time elapsed since an arbitrary, fixed origin.
    ///
    /// Must never decrease between calls.
    fn now(&self) -> Duration;

    /// Blocks for at least the given duration.
    ///
    /// Used for short settle times (a few microseconds), so implementations may spin.
    fn delay(&self, duration: Duration);
}

/// [Clock] backed by [Instant], counting from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Delays shorter than this spin instead of going through the scheduler.
    pub const SPIN_LIMIT: Duration = Duration::from_micros(100);

    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    fn spins(duration: Duration) -> bool {
        duration < Self::SPIN_LIMIT
    }
}

/// Spins on [Instant] until `duration` has passed.
pub fn busy_wait(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn delay(&self, duration: Duration) {
        if Self::spins(duration) {
            busy_wait(duration);
        } else {
            sleep(duration);
        }
    }
}
