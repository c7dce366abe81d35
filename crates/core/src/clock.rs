//! Wall clock used for access token expiry checks

use chrono::Utc;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;

    /// Seconds since the Unix epoch, keeping the millisecond fraction
    #[allow(clippy::cast_precision_loss)]
    fn now_secs(&self) -> f64 {
        self.now_millis() as f64 / 1000.0
    }
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock frozen at a fixed instant (milliseconds since the epoch)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl FixedClock {
    /// Freeze the clock at a whole number of seconds
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_fixed_clock_keeps_fraction() {
        let clock = FixedClock(1_700_000_000_250);
        assert_eq!(clock.now_secs(), 1_700_000_000.25);
        assert_eq!(FixedClock::from_secs(10).now_millis(), 10_000);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2023-11-14T22:13:20Z
        assert!(SystemClock.now_millis() > 1_700_000_000_000);
    }
}
