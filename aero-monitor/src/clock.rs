//! Time source and stop flag for the scheduler loop

use crate::model::Timestamp;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of [`Timestamp`]s. Injected so tests can drive time by hand.
pub trait Clock: Send {
    fn now(&self) -> Timestamp;
}

/// Production clock: `Instant` for scheduling, `Utc::now()` for records.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp {
            since_start: self.origin.elapsed(),
            wall: Utc::now(),
        }
    }
}

/// Cloneable stop flag shared between the signal handler and the loop.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b.since_start >= a.since_start);
    }

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let stop = StopSignal::new();
        let handle = stop.clone();
        assert!(!stop.is_triggered());
        handle.trigger();
        assert!(stop.is_triggered());
    }
}
