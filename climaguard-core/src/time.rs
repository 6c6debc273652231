//! Time management for the scoring pipeline
//!
//! Provides clock abstraction so components with time-dependent behavior
//! (cache staleness, "now" defaults) can be driven deterministically in tests:
//! - System clock (production)
//! - Fixed clock (tests, replay)

use chrono::{DateTime, Duration, Utc};

/// Wall-clock instant of a reading
pub type Timestamp = DateTime<Utc>;

/// Source of time for the system
pub trait TimeSource: Send + Sync {
    /// Current instant
    fn now(&self) -> Timestamp;

    /// Check if this source follows the real wall clock
    fn is_wall_clock(&self) -> bool;
}

/// System time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Fixed time source for testing
///
/// Interior mutability lets a test advance the clock while a component holds
/// a shared reference to it.
#[derive(Debug)]
pub struct FixedTime {
    timestamp: std::sync::Mutex<Timestamp>,
}

impl FixedTime {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: std::sync::Mutex::new(timestamp),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        if let Ok(mut guard) = self.timestamp.lock() {
            *guard = timestamp;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.timestamp.lock() {
            *guard = *guard + by;
        }
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        match self.timestamp.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn is_wall_clock(&self) -> bool {
        (**self).is_wall_clock()
    }
}

/// Elapsed time between two instants, zero if `later` precedes `earlier`
pub fn elapsed(earlier: Timestamp, later: Timestamp) -> Duration {
    let delta = later - earlier;
    if delta < Duration::zero() {
        Duration::zero()
    } else {
        delta
    }
}
