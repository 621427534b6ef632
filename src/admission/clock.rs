//! Monotonic time source for the admission path.

use std::time::Instant;

/// Trait over the monotonic clock.
///
/// The admission path only does elapsed-time arithmetic, never wall-clock
/// display, so `Instant` is the right currency. The trait exists so tests
/// can drive time explicitly instead of sleeping.
pub trait Clock: Send + Sync {
    /// Current monotonic timestamp. Never goes backward within a process.
    fn now(&self) -> Instant;
}

/// Production clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Test clock advanced explicitly by the test body.
    pub struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        pub fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }
}
