//! Monthly billing-cycle arithmetic.
//!
//! Occurrences are midnight UTC on the target date. A day-of-month that does
//! not exist in the target month (31 in April, 30 in February) clamps to the
//! last day of that month instead of rolling into the next one.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

fn following_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = following_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// The date with `day` in the given month, pulled back to the month's last day if needed.
pub fn clamp_day(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is valid for its month")
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// First occurrence of `day_of_month` strictly after `reference`.
///
/// The candidate in the reference month is used only if it is still in the
/// future; otherwise the same day in the following month.
pub fn next_occurrence(day_of_month: u32, reference: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = (reference.year(), reference.month());
    let candidate = midnight(clamp_day(year, month, day_of_month));
    if candidate > reference {
        return candidate;
    }
    let (year, month) = following_month(year, month);
    midnight(clamp_day(year, month, day_of_month))
}

/// The occurrence one month after `prior_target`, re-anchored on `day_of_month`.
///
/// A clamped prior date does not shift later months: 31 goes Jan 31, Feb 29, Mar 31.
pub fn advance(prior_target: DateTime<Utc>, day_of_month: u32) -> DateTime<Utc> {
    let (year, month) = following_month(prior_target.year(), prior_target.month());
    midnight(clamp_day(year, month, day_of_month))
}
