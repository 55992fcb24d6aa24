//! Time handling for Darwin values.
//!
//! Darwin transmits wall-clock times without dates, so every timestamp is
//! reconstructed from the service start date plus a clock string, with a
//! rollover heuristic for services running past midnight.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

/// Rollover threshold: a combined time earlier than its base by more than
/// this is assumed to belong to the next day.
const ROLLOVER_THRESHOLD_HOURS: i64 = 2;

/// Wrap guard for delay arithmetic, in minutes (20 hours).
const WRAP_LIMIT_MINUTES: f64 = 1200.0;

/// Minutes in a day.
const DAY_MINUTES: f64 = 1440.0;

/// Parse a Darwin or HSP clock string.
///
/// Accepts `HH:MM`, `HH:MM:SS` and the bare `HHMM` form used by HSP.
/// Anything else (including out-of-range values) yields `None`.
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }

    if let Some((hh, rest)) = s.split_once(':') {
        let hour: u32 = hh.parse().ok()?;
        return match rest.split_once(':') {
            None => {
                let minute: u32 = rest.parse().ok()?;
                NaiveTime::from_hms_opt(hour, minute, 0)
            }
            Some((mm, ss)) => {
                let minute: u32 = mm.parse().ok()?;
                let second: u32 = ss.parse().ok()?;
                NaiveTime::from_hms_opt(hour, minute, second)
            }
        };
    }

    // HSP-style "HHMM"
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        let hour: u32 = s[..2].parse().ok()?;
        let minute: u32 = s[2..].parse().ok()?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }

    None
}

/// Combine a service start date (`YYYY-MM-DD`) and a clock string into a
/// zoned timestamp.
///
/// When `base` is given and the combined timestamp lies before it by more
/// than the rollover threshold, the result is advanced by one day. This is
/// what turns a `23:55` planned departure with a `00:04` actual into two
/// timestamps nine minutes apart.
pub fn combine(
    ssd: &str,
    clock: &str,
    base: Option<DateTime<Tz>>,
    tz: Tz,
) -> Option<DateTime<Tz>> {
    let time = parse_clock(clock)?;
    let date = NaiveDate::parse_from_str(ssd.trim(), "%Y-%m-%d").ok()?;

    let naive = NaiveDateTime::new(date, time);
    let mut dt = tz.from_local_datetime(&naive).earliest()?;

    if let Some(base) = base {
        if dt < base && base - dt > Duration::hours(ROLLOVER_THRESHOLD_HOURS) {
            dt += Duration::days(1);
        }
    }

    Some(dt)
}

/// `actual - planned` in minutes, collapsing midnight-crossing artefacts.
///
/// Deltas beyond ±1200 minutes are folded back by one day, so a planned
/// `23:58` against an actual `00:04` on the same service date comes out as
/// `+6.0` rather than `-1434.0`.
pub fn diff_minutes_wrap(planned: DateTime<Tz>, actual: DateTime<Tz>) -> f64 {
    let mut minutes = (actual - planned).num_seconds() as f64 / 60.0;

    if minutes > WRAP_LIMIT_MINUTES {
        minutes -= DAY_MINUTES;
    }
    if minutes < -WRAP_LIMIT_MINUTES {
        minutes += DAY_MINUTES;
    }

    minutes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::London;

    // --- parse_clock tests ---

    #[test]
    fn parse_clock_hh_mm() {
        let t = parse_clock("09:43").unwrap();
        assert_eq!((t.hour(), t.minute(), t.second()), (9, 43, 0));
    }

    #[test]
    fn parse_clock_hh_mm_ss() {
        let t = parse_clock("09:47:30").unwrap();
        assert_eq!((t.hour(), t.minute(), t.second()), (9, 47, 30));
    }

    #[test]
    fn parse_clock_hhmm() {
        let t = parse_clock("0657").unwrap();
        assert_eq!((t.hour(), t.minute()), (6, 57));
    }

    #[test]
    fn parse_clock_rejects_garbage() {
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("   "), None);
        assert_eq!(parse_clock("now"), None);
        assert_eq!(parse_clock("25:00"), None);
        assert_eq!(parse_clock("09:61"), None);
        assert_eq!(parse_clock("123"), None);
        assert_eq!(parse_clock("12345"), None);
        assert_eq!(parse_clock("09:"), None);
    }

    // --- combine tests ---

    #[test]
    fn combine_plain() {
        let dt = combine("2025-04-10", "09:00", None, London).unwrap();
        assert_eq!(dt.hour(), 9);
        assert_eq!(dt.minute(), 0);
        // April in London is BST (UTC+1)
        assert_eq!(dt.naive_utc().hour(), 8);
    }

    #[test]
    fn combine_rolls_over_past_midnight() {
        let planned = combine("2025-04-10", "23:55", None, London).unwrap();
        let actual = combine("2025-04-10", "00:04", Some(planned), London).unwrap();
        assert!(actual > planned);
        assert_eq!(diff_minutes_wrap(planned, actual), 9.0);
    }

    #[test]
    fn combine_does_not_roll_within_threshold() {
        // 09:00 base, 08:30 combined: only 30 minutes earlier, stays same day.
        let base = combine("2025-04-10", "09:00", None, London).unwrap();
        let dt = combine("2025-04-10", "08:30", Some(base), London).unwrap();
        assert!(dt < base);
        assert_eq!(diff_minutes_wrap(base, dt), -30.0);
    }

    #[test]
    fn combine_rejects_bad_inputs() {
        assert!(combine("2025-13-01", "09:00", None, London).is_none());
        assert!(combine("not-a-date", "09:00", None, London).is_none());
        assert!(combine("2025-04-10", "nope", None, London).is_none());
    }

    // --- diff_minutes_wrap tests ---

    #[test]
    fn diff_wrap_is_identity_in_normal_range() {
        let planned = combine("2025-04-10", "09:00", None, London).unwrap();
        let actual = combine("2025-04-10", "09:03", None, London).unwrap();
        assert_eq!(diff_minutes_wrap(planned, actual), 3.0);
        assert_eq!(diff_minutes_wrap(actual, planned), -3.0);
    }

    #[test]
    fn diff_wrap_collapses_naive_midnight_artefact() {
        // Without a base, 00:04 lands on the same calendar day as 23:58,
        // producing a raw -1434; the wrap folds it to +6.
        let planned = combine("2025-04-10", "23:58", None, London).unwrap();
        let actual = combine("2025-04-10", "00:04", None, London).unwrap();
        assert_eq!(diff_minutes_wrap(planned, actual), 6.0);
    }

    #[test]
    fn diff_wrap_stays_within_bounds() {
        let planned = combine("2025-04-10", "12:00", None, London).unwrap();
        for clock in ["00:00", "06:00", "11:59", "12:00", "18:00", "23:59"] {
            let actual = combine("2025-04-10", clock, None, London).unwrap();
            let d = diff_minutes_wrap(planned, actual);
            assert!(d > -WRAP_LIMIT_MINUTES && d <= WRAP_LIMIT_MINUTES, "{clock} -> {d}");
        }
    }
}
