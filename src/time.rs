//! Time utilities for Boostr
//!
//! Clock helpers, the jittered achieve interval and the daily rest window.

use chrono::{DateTime, Duration, Timelike, Utc};
use rand::Rng;

/// Minutes in one day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Get the current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Uniform random minute count in `[min, max]`.
///
/// Arguments are swapped if given in the wrong order.
pub fn jittered_minutes(min: u32, max: u32) -> u32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if lo == hi {
        return lo;
    }
    rand::thread_rng().gen_range(lo..=hi)
}

/// `now` plus a jittered number of minutes in `[min, max]`.
pub fn jittered_deadline(now: DateTime<Utc>, min: u32, max: u32) -> DateTime<Utc> {
    now + Duration::minutes(i64::from(jittered_minutes(min, max)))
}

/// Whole minutes between `last` and `now`, saturating at zero.
pub fn elapsed_minutes(last: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let minutes = (now - last).num_minutes();
    u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
}

/// Whether `now` falls inside the daily rest window.
///
/// The window starts at 00:00 UTC and lasts `rest_minutes_per_day`. Zero
/// disables resting.
pub fn is_rest_period(now: DateTime<Utc>, rest_minutes_per_day: u32) -> bool {
    if rest_minutes_per_day == 0 {
        return false;
    }
    let minute_of_day = now.hour() * 60 + now.minute();
    minute_of_day < rest_minutes_per_day.min(MINUTES_PER_DAY)
}

/// Convert a non-negative chrono duration to a std duration.
pub fn to_std(duration: Duration) -> std::time::Duration {
    duration.to_std().unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_jittered_minutes_in_range() {
        for _ in 0..200 {
            let m = jittered_minutes(5, 15);
            assert!((5..=15).contains(&m));
        }
    }

    #[test]
    fn test_jittered_minutes_degenerate() {
        assert_eq!(jittered_minutes(7, 7), 7);
    }

    #[test]
    fn test_jittered_minutes_swapped_bounds() {
        for _ in 0..50 {
            let m = jittered_minutes(20, 10);
            assert!((10..=20).contains(&m));
        }
    }

    #[test]
    fn test_jittered_deadline_bounds() {
        let now = at(12, 0);
        let deadline = jittered_deadline(now, 10, 30);
        assert!(deadline >= now + Duration::minutes(10));
        assert!(deadline <= now + Duration::minutes(30));
    }

    #[test]
    fn test_elapsed_minutes() {
        assert_eq!(elapsed_minutes(at(12, 0), at(12, 45)), 45);
        assert_eq!(elapsed_minutes(at(12, 45), at(12, 0)), 0);
    }

    #[test]
    fn test_rest_period_disabled() {
        assert!(!is_rest_period(at(0, 0), 0));
    }

    #[test]
    fn test_rest_period_window() {
        assert!(is_rest_period(at(0, 0), 90));
        assert!(is_rest_period(at(1, 29), 90));
        assert!(!is_rest_period(at(1, 30), 90));
        assert!(!is_rest_period(at(23, 59), 90));
    }

    #[test]
    fn test_rest_period_whole_day() {
        assert!(is_rest_period(at(23, 59), MINUTES_PER_DAY));
    }
}
