use std::cmp::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

/// A point in time with nanosecond precision, stored the way Firestore does:
/// seconds since the Unix epoch plus a non-negative nanosecond offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        let mut timestamp = Self { seconds, nanos };
        timestamp.normalize();
        timestamp
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => Self::new(duration.as_secs() as i64, duration.subsec_nanos() as i32),
            Err(err) => {
                let duration = err.duration();
                Self::new(
                    -(duration.as_secs() as i64),
                    -(duration.subsec_nanos() as i32),
                )
            }
        }
    }

    /// Returns `None` when the instant is outside what `SystemTime` can hold.
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let nanos = Duration::from_nanos(self.nanos as u64);
        let whole = Duration::from_secs(self.seconds.unsigned_abs());
        if self.seconds >= 0 {
            UNIX_EPOCH.checked_add(whole)?.checked_add(nanos)
        } else {
            UNIX_EPOCH.checked_sub(whole)?.checked_add(nanos)
        }
    }

    /// Calendar-time conversion that keeps whole seconds only.
    ///
    /// Plain date-time fields are stored with zero sub-second precision; use
    /// [`Timestamp::from`] when the nanoseconds matter.
    pub fn from_datetime_seconds(value: &DateTime<Utc>) -> Self {
        Self::new(value.timestamp(), 0)
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanos as u32).single()
    }

    fn normalize(&mut self) {
        let extra_seconds = self.nanos.div_euclid(1_000_000_000);
        self.seconds = self.seconds.saturating_add(extra_seconds.into());
        self.nanos = self.nanos.rem_euclid(1_000_000_000);
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value.timestamp(), value.timestamp_subsec_nanos() as i32)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(value: SystemTime) -> Self {
        Self::from_system_time(value)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.seconds.cmp(&other.seconds) {
            Ordering::Equal => self.nanos.cmp(&other.nanos),
            ordering => ordering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_nanoseconds() {
        let timestamp = Timestamp::new(1, 1_500_000_000);
        assert_eq!(timestamp.seconds, 2);
        assert_eq!(timestamp.nanos, 500_000_000);

        let negative = Timestamp::new(0, -1);
        assert_eq!(negative.seconds, -1);
        assert_eq!(negative.nanos, 999_999_999);
    }

    #[test]
    fn ordering() {
        let earlier = Timestamp::new(1, 0);
        let later = Timestamp::new(2, 0);
        assert!(earlier < later);
    }

    #[test]
    fn datetime_conversions() {
        let datetime = Utc.timestamp_opt(1_700_000_000, 250).single().unwrap();
        assert_eq!(Timestamp::from(datetime), Timestamp::new(1_700_000_000, 250));
        assert_eq!(
            Timestamp::from_datetime_seconds(&datetime),
            Timestamp::new(1_700_000_000, 0)
        );
        assert_eq!(Timestamp::new(5, 7).to_datetime().unwrap().timestamp_subsec_nanos(), 7);
    }

    #[test]
    fn system_time_roundtrip() {
        let ts = Timestamp::new(-3, 400);
        assert_eq!(Timestamp::from_system_time(ts.to_system_time().unwrap()), ts);
    }

    #[test]
    fn extreme_seconds_do_not_overflow() {
        let max = Timestamp::new(i64::MAX, 1_000_000_000);
        assert_eq!(max.seconds, i64::MAX);
        assert_eq!(max.nanos, 0);

        let min = Timestamp::new(i64::MIN, -1);
        assert_eq!(min.seconds, i64::MIN);
        assert_eq!(min.nanos, 999_999_999);

        // Representable range is platform dependent; conversion must not panic.
        for ts in [max, min, Timestamp::new(i64::MAX, 999_999_999)] {
            let _ = ts.to_system_time();
        }
    }
}
