//! Injected dependencies shared by engine components.

use chrono::{DateTime, Utc};

/// Clock trait — abstracts time operations for testability.
///
/// Production code uses [`SystemClock`]; tests inject a manually advanced
/// clock so hold expiry and the retry-age guard can be exercised without
/// sleeping.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
