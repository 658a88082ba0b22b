use chrono::{DateTime, TimeZone, Timelike};
use std::time::Duration;

const SECS_PER_HOUR: u64 = 3600;

/// Time left until the next `:00:00` on the wall clock of `now`'s zone.
///
/// Always in `(0, 3600]` seconds: exactly on the hour yields a full hour.
pub fn until_next_hour<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let into_hour = Duration::new(
        u64::from(now.minute()) * 60 + u64::from(now.second()),
        // Leap-second nanos (>= 1e9) are clamped into the current second.
        now.nanosecond().min(999_999_999),
    );
    Duration::from_secs(SECS_PER_HOUR) - into_hour
}

/// The next `:00:00` on the wall clock of `now`'s zone.
pub fn next_hour<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let wait = until_next_hour(now);
    now.clone() + chrono::Duration::nanoseconds(wait.as_nanos() as i64)
}

/// Wall-clock time still to go before `target`; `None` once it has been reached.
pub fn remaining_until<Tz: TimeZone>(target: &DateTime<Tz>, now: &DateTime<Tz>) -> Option<Duration> {
    (target.clone() - now.clone())
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
}

/// Cyclic 0..=59 styling parameter: `59 - second-of-minute`.
pub fn lightness_level<Tz: TimeZone>(now: &DateTime<Tz>) -> u32 {
    59 - now.second().min(59)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, FixedOffset, Utc};

    #[test]
    fn lands_on_next_hour_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 14, 59, 30).unwrap();
        assert_eq!(until_next_hour(&now), Duration::from_secs(30));

        let now = Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 1).unwrap();
        assert_eq!(until_next_hour(&now), Duration::from_secs(3599));
    }

    #[test]
    fn exactly_on_the_hour_waits_a_full_hour() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap();
        assert_eq!(until_next_hour(&now), Duration::from_secs(3600));
    }

    #[test]
    fn sub_second_precision_is_kept() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 23, 59, 59).unwrap()
            + ChronoDuration::milliseconds(250);
        assert_eq!(until_next_hour(&now), Duration::from_millis(750));

        let wake = now + ChronoDuration::from_std(until_next_hour(&now)).unwrap();
        assert_eq!((wake.hour(), wake.minute(), wake.second(), wake.nanosecond()), (0, 0, 0, 0));
    }

    #[test]
    fn every_second_of_an_hour_is_in_range_and_hits_boundary() {
        // Half-hour offset zone: the boundary is local, not UTC.
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let start = ist.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap();
        for s in 0..3600 {
            let now = start + ChronoDuration::seconds(s);
            let d = until_next_hour(&now);
            assert!(d > Duration::ZERO && d <= Duration::from_secs(3600), "{now}: {d:?}");

            let wake = now + ChronoDuration::from_std(d).unwrap();
            assert_eq!((wake.minute(), wake.second()), (0, 0), "{now}");
            assert_eq!(wake.hour(), 11);
        }
    }

    #[test]
    fn next_hour_is_the_local_boundary() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = ist.with_ymd_and_hms(2026, 6, 1, 10, 20, 30).unwrap()
            + ChronoDuration::milliseconds(250);
        assert_eq!(next_hour(&now), ist.with_ymd_and_hms(2026, 6, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn remaining_covers_a_lagging_wall_clock() {
        let target = Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0).unwrap();

        // Monotonic timer fired but the wall clock still reads just before the hour.
        let early = target - ChronoDuration::milliseconds(3);
        assert_eq!(remaining_until(&target, &early), Some(Duration::from_millis(3)));

        assert_eq!(remaining_until(&target, &target), None);
        let late = target + ChronoDuration::milliseconds(40);
        assert_eq!(remaining_until(&target, &late), None);
    }

    #[test]
    fn lightness_counts_down_with_the_second() {
        let at = |s| Utc.with_ymd_and_hms(2026, 1, 5, 9, 15, s).unwrap();
        assert_eq!(lightness_level(&at(0)), 59);
        assert_eq!(lightness_level(&at(17)), 42);
        assert_eq!(lightness_level(&at(59)), 0);
    }
}
