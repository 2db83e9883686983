//! Time source abstraction for the condition poller.
//!
//! Polling code never touches `Instant`/`thread::sleep` directly; it goes
//! through [`Clock`] so every deadline property can be tested against a
//! fake clock with virtual time, decoupled from any real browser.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source used by wait loops.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since this clock's origin.
    fn now_ms(&self) -> u64;

    /// Suspend the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real clock backed by `Instant` and `thread::sleep`.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now.
    #[must_use]
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
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fake clock for deterministic tests.
///
/// `sleep` advances virtual time instead of blocking, and the number of
/// sleeps is recorded so tests can assert exactly how many polls a wait
/// performed.
#[derive(Debug, Default)]
pub struct FakeClock {
    current_ms: AtomicU64,
    sleeps: AtomicU64,
}

impl FakeClock {
    /// Create a fake clock at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance virtual time without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let _ = self
            .current_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of `sleep` calls observed so far.
    #[must_use]
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        let _ = self
            .current_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        let _ = self.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod system_clock_tests {
        use super::*;

        #[test]
        fn test_now_advances() {
            let clock = SystemClock::new();
            let before = clock.now_ms();
            clock.sleep(Duration::from_millis(10));
            assert!(clock.now_ms() >= before + 10);
        }
    }

    mod fake_clock_tests {
        use super::*;

        #[test]
        fn test_starts_at_zero() {
            let clock = FakeClock::new();
            assert_eq!(clock.now_ms(), 0);
            assert_eq!(clock.sleep_count(), 0);
        }

        #[test]
        fn test_sleep_advances_virtual_time() {
            let clock = FakeClock::new();
            clock.sleep(Duration::from_millis(500));
            clock.sleep(Duration::from_millis(500));
            assert_eq!(clock.now_ms(), 1000);
            assert_eq!(clock.sleep_count(), 2);
        }

        #[test]
        fn test_advance_does_not_count_as_sleep() {
            let clock = FakeClock::new();
            clock.advance(Duration::from_millis(250));
            assert_eq!(clock.now_ms(), 250);
            assert_eq!(clock.sleep_count(), 0);
        }
    }
}
