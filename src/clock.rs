use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;

/// A source of the current time.
///
/// Session stores take their notion of "now" from a clock, such that expiry can be tested
/// without sleeping.
pub trait Clock: Debug + Send + Sync {
    /// The current date and time.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock of the system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// **This type is supposed to be used in tests only.**
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a manual clock showing the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward by the given amount of seconds.
    /// Negative amounts move it backwards.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.now.lock() += Duration::seconds(seconds);
    }

    /// Set the clock to the given time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
