//! Monotonic + wall-clock timestamp pair, and an injectable clock for tests.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A point in time expressed both as a wall-clock Unix timestamp (for
/// serialization and cross-run comparison) and a monotonic instant (for
/// interval arithmetic that must not be perturbed by clock steps).
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    pub unix_seconds: f64,
    pub monotonic: Instant,
}

impl Timestamp {
    pub fn now(clock: &dyn Clock) -> Self {
        clock.now()
    }

    /// Seconds elapsed between `self` and `other`, measured on the monotonic
    /// clock. Positive when `other` is after `self`.
    pub fn elapsed_since(&self, other: &Timestamp) -> f64 {
        if other.monotonic >= self.monotonic {
            (other.monotonic - self.monotonic).as_secs_f64()
        } else {
            -(self.monotonic - other.monotonic).as_secs_f64()
        }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.monotonic == other.monotonic
    }
}

/// Source of time, injected so tests can advance a synthetic clock instead
/// of racing `SystemTime::now()`.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The real wall-clock/monotonic-clock pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let unix_seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        Timestamp {
            unix_seconds,
            monotonic: Instant::now(),
        }
    }
}

/// A manually-advanced clock for deterministic tests.
#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct State {
        unix_seconds: f64,
        base: Instant,
        offset: Duration,
    }

    pub struct FixedClock {
        state: Mutex<State>,
    }

    impl FixedClock {
        pub fn new(unix_seconds: f64) -> Self {
            Self {
                state: Mutex::new(State {
                    unix_seconds,
                    base: Instant::now(),
                    offset: Duration::ZERO,
                }),
            }
        }

        pub fn advance(&self, secs: f64) {
            let mut guard = self.state.lock().expect("clock mutex poisoned");
            guard.unix_seconds += secs;
            guard.offset += Duration::from_secs_f64(secs.max(0.0));
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            let guard = self.state.lock().expect("clock mutex poisoned");
            Timestamp {
                unix_seconds: guard.unix_seconds,
                monotonic: guard.base + guard.offset,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn advances_both_wall_clock_and_monotonic() {
            let clock = FixedClock::new(1_000.0);
            let t0 = clock.now();
            clock.advance(5.0);
            let t1 = clock.now();
            assert_eq!(t1.unix_seconds - t0.unix_seconds, 5.0);
            assert_eq!(t0.elapsed_since(&t1), 5.0);
        }
    }
}
