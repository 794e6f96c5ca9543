//! Manually advanced clock for deterministic tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;
use ticketline_core::environment::Clock;

/// A [`Clock`] that returns a fixed instant until explicitly moved.
///
/// Lets tests lapse a 20-minute hold or age a queued message past the
/// 30-second retry window without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock pinned at the given instant.
    #[must_use]
    pub const fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    /// Pins the clock to a specific instant.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Default for ManualClock {
    /// A clock pinned at an arbitrary fixed date.
    fn default() -> Self {
        // Midday, so tests can move hours in either direction.
        Self::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().unwrap_or_default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }
}
