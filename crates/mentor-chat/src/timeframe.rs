//! Pinning a spoken timeframe to a concrete `[start, end)` range.
//!
//! Day boundaries are local midnights in the student's zone, converted to
//! UTC for the calendar provider.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

use mentor_core::error::{MentorError, Result};
use mentor_core::time::local_midnight;
use mentor_core::types::TimeRange;

use crate::types::Timeframe;

/// Days covered by "this week" and by an unspecified timeframe.
const WEEK_DAYS: i64 = 7;

/// Resolve `timeframe` relative to `now` in `tz`.
///
/// Fails with `InvalidInput` for dates that do not exist.
pub fn resolve(timeframe: &Timeframe, now: DateTime<Utc>, tz: Tz) -> Result<TimeRange> {
    let today = now.with_timezone(&tz).date_naive();

    match timeframe {
        Timeframe::Today => days(today, 1, tz),
        Timeframe::Tomorrow => days(today + Duration::days(1), 1, tz),
        Timeframe::ThisWeek => days(today, WEEK_DAYS, tz),
        Timeframe::NextWeek => {
            let until_monday = WEEK_DAYS - i64::from(today.weekday().num_days_from_monday());
            days(today + Duration::days(until_monday), WEEK_DAYS, tz)
        }
        Timeframe::Weekday(weekday) => days(next_weekday(today, *weekday), 1, tz),
        Timeframe::Date { year, month, day } => {
            let date = explicit_date(today, *year, *month, *day)?;
            days(date, 1, tz)
        }
        Timeframe::Upcoming => TimeRange::new(now, now + Duration::days(WEEK_DAYS)),
    }
}

/// Human wording for a resolved timeframe, e.g. "today" or "on Friday, October 16".
pub fn describe(timeframe: &Timeframe, range: &TimeRange, tz: Tz) -> String {
    match timeframe {
        Timeframe::Today => "today".to_string(),
        Timeframe::Tomorrow => "tomorrow".to_string(),
        Timeframe::ThisWeek => "this week".to_string(),
        Timeframe::NextWeek => "next week".to_string(),
        Timeframe::Weekday(_) | Timeframe::Date { .. } => format!(
            "on {}",
            range.start.with_timezone(&tz).format("%A, %B %-d")
        ),
        Timeframe::Upcoming => "in the next 7 days".to_string(),
    }
}

fn days(first: NaiveDate, count: i64, tz: Tz) -> Result<TimeRange> {
    TimeRange::new(
        local_midnight(first, tz),
        local_midnight(first + Duration::days(count), tz),
    )
}

fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (i64::from(target.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday())
        + WEEK_DAYS)
        % WEEK_DAYS;
    today + Duration::days(ahead)
}

fn explicit_date(today: NaiveDate, year: Option<i32>, month: u32, day: u32) -> Result<NaiveDate> {
    let invalid = || {
        MentorError::InvalidInput(match year {
            Some(y) => format!("{:04}-{:02}-{:02} is not a valid date", y, month, day),
            None => format!("month {} day {} is not a valid date", month, day),
        })
    };

    match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day).ok_or_else(invalid),
        None => {
            // "October 20" means the next such date, this year or next.
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Ok(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day).ok_or_else(invalid),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Thursday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 14, 30, 0).unwrap()
    }

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_today_utc() {
        let range = resolve(&Timeframe::Today, now(), chrono_tz::UTC).unwrap();
        assert_eq!(range.start, utc(15, 0));
        assert_eq!(range.end, utc(16, 0));
    }

    #[test]
    fn test_today_in_offset_zone() {
        let tz = chrono_tz::America::New_York;
        let range = resolve(&Timeframe::Today, now(), tz).unwrap();
        assert_eq!(range.start, utc(15, 4));
        assert_eq!(range.end, utc(16, 4));
    }

    #[test]
    fn test_today_uses_local_date_not_utc_date() {
        // 02:00 UTC on the 16th is still the 15th in Los Angeles.
        let late = Utc.with_ymd_and_hms(2026, 10, 16, 2, 0, 0).unwrap();
        let range = resolve(&Timeframe::Today, late, chrono_tz::America::Los_Angeles).unwrap();
        assert_eq!(range.start, utc(15, 7));
    }

    #[test]
    fn test_tomorrow() {
        let range = resolve(&Timeframe::Tomorrow, now(), chrono_tz::UTC).unwrap();
        assert_eq!(range.start, utc(16, 0));
        assert_eq!(range.end, utc(17, 0));
    }

    #[test]
    fn test_this_week_is_seven_days_from_today() {
        let range = resolve(&Timeframe::ThisWeek, now(), chrono_tz::UTC).unwrap();
        assert_eq!(range.start, utc(15, 0));
        assert_eq!(range.end, utc(22, 0));
    }

    #[test]
    fn test_next_week_starts_monday() {
        let range = resolve(&Timeframe::NextWeek, now(), chrono_tz::UTC).unwrap();
        assert_eq!(range.start, utc(19, 0));
        assert_eq!(range.end, utc(26, 0));
    }

    #[test]
    fn test_weekday_today_and_later() {
        let thursday = resolve(&Timeframe::Weekday(Weekday::Thu), now(), chrono_tz::UTC).unwrap();
        assert_eq!(thursday.start, utc(15, 0));
        let monday = resolve(&Timeframe::Weekday(Weekday::Mon), now(), chrono_tz::UTC).unwrap();
        assert_eq!(monday.start, utc(19, 0));
    }

    #[test]
    fn test_explicit_iso_date() {
        let tf = Timeframe::Date {
            year: Some(2026),
            month: 10,
            day: 20,
        };
        let range = resolve(&tf, now(), chrono_tz::UTC).unwrap();
        assert_eq!(range.start, utc(20, 0));
        assert_eq!(
            describe(&tf, &range, chrono_tz::UTC),
            "on Tuesday, October 20"
        );
    }

    #[test]
    fn test_month_day_rolls_to_next_year() {
        let tf = Timeframe::Date {
            year: None,
            month: 3,
            day: 1,
        };
        let range = resolve(&tf, now(), chrono_tz::UTC).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_malformed_date_is_invalid_input() {
        let tf = Timeframe::Date {
            year: Some(2026),
            month: 13,
            day: 45,
        };
        let err = resolve(&tf, now(), chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));

        let tf = Timeframe::Date {
            year: None,
            month: 2,
            day: 30,
        };
        assert!(resolve(&tf, now(), chrono_tz::UTC).is_err());
    }

    #[test]
    fn test_upcoming_starts_now() {
        let range = resolve(&Timeframe::Upcoming, now(), chrono_tz::UTC).unwrap();
        assert_eq!(range.start, now());
        assert_eq!(range.end, now() + Duration::days(7));
        assert_eq!(
            describe(&Timeframe::Upcoming, &range, chrono_tz::UTC),
            "in the next 7 days"
        );
    }
}
