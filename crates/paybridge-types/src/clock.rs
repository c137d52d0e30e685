//! Wall-clock capability
//!
//! Token expiry and rate-limit windows are computed against an injected
//! [`Clock`] so tests can move time explicitly.

use chrono::{DateTime, Utc};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current Unix time in whole seconds
    fn unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }

    /// Current Unix time in microseconds
    fn unix_micros(&self) -> i64 {
        self.now().timestamp_micros()
    }
}

/// System clock using `Utc::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing
///
/// Clones share the same time, so advancing one advances all of them.
/// Available in test builds or with the `test-utils` feature.
///
/// ```ignore
/// use paybridge_types::clock::{Clock, MockClock};
/// use std::time::Duration;
///
/// let clock = MockClock::at_unix(1_700_000_000);
/// clock.advance(Duration::from_secs(30));
/// assert_eq!(clock.unix_seconds(), 1_700_000_030);
/// ```
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    current: std::sync::Arc<parking_lot::Mutex<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockClock {
    /// Start at a specific instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: std::sync::Arc::new(parking_lot::Mutex::new(start)),
        }
    }

    /// Start at a Unix timestamp (seconds)
    pub fn at_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Move time forward
    pub fn advance(&self, by: std::time::Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut current = self.current.lock();
        *current += by;
    }

    /// Jump to a specific instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.lock() = to;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let t1 = clock.unix_micros();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.unix_micros() > t1);
    }

    #[test]
    fn test_mock_clock_shared_between_clones() {
        let clock = MockClock::at_unix(1_000);
        let other = clock.clone();
        other.advance(Duration::from_millis(1_500));
        assert_eq!(clock.unix_seconds(), 1_001);
        assert_eq!(clock.unix_micros(), 1_001_500_000);
    }
}
