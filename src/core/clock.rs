/*
 * Wall-clock abstraction. Commits stamp history records with the current
 * time and new items take their id from it, so the clock is injected as a
 * trait object; tests substitute a fixed instant.
 */
use super::models::Timestamp;
use time::OffsetDateTime;

pub trait ClockOperations: Send + Sync {
    fn now_millis(&self) -> Timestamp;
}

pub struct SystemClock {}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {}
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockOperations for SystemClock {
    fn now_millis(&self) -> Timestamp {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock::new().now_millis() > 1_577_836_800_000);
    }
}
