//! Time sources for the control loop.
//!
//! The loop never reads the system time directly. Everything that depends on
//! elapsed time (integration step, bound refresh throttling, poll cadence)
//! goes through a [`Clock`], so tests and offline replays can run hours of
//! control in microseconds with a [`ManualClock`].

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Wall-clock instant used for every timestamp in the system.
pub type Timestamp = DateTime<Utc>;

/// Source of time plus the ability to block until later.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;

    /// Block for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Real clock: `Utc::now()` and a blocking thread sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// `sleep` advances the stored instant and records the requested duration.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Timestamp,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: start,
            sleeps: Vec::new(),
        }
    }

    /// Clock starting at the Unix epoch.
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&mut self, duration: Duration) {
        self.now += to_delta(duration);
    }

    /// Durations passed to [`Clock::sleep`], oldest first.
    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.advance(duration);
    }
}

/// Elapsed seconds from `earlier` to `later`; negative if the clock went back.
pub fn seconds_between(earlier: Timestamp, later: Timestamp) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
