//! Injectable UTC clocks and the fixed-width timestamp format.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current UTC time.
///
/// The publisher never reads the system clock directly, so timestamp
/// allocation can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn utc_now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Format `at` as `yyyy.MM.dd.HH.mm.ss.fffffff`.
///
/// Every field is zero-padded and the fraction is in 100 ns ticks, so for
/// years 0000..=9999 lexicographic order equals chronological order.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    // Leap seconds report nanos >= 1e9; clamp so the width stays fixed.
    let ticks = (at.timestamp_subsec_nanos() / 100).min(9_999_999);
    format!("{}.{ticks:07}", at.format("%Y.%m.%d.%H.%M.%S"))
}
