//! Month arithmetic shared by the recurrence engine and the store.
//!
//! A month is keyed by its *anchor*: the epoch seconds of 00:00:00 UTC on the
//! first day of that month. Anchors are plain integers, so they compare, sort
//! and hash without any calendar context.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeZone, Utc};

/// Anchor of the UTC calendar month containing `date`.
pub(crate) fn month_anchor<Tz: TimeZone>(date: &DateTime<Tz>) -> i64 {
    let utc = date.with_timezone(&Utc);
    NaiveDate::from_ymd_opt(utc.year(), utc.month(), 1)
        .map(|first| first.and_time(NaiveTime::MIN).and_utc().timestamp())
        .unwrap_or_else(|| utc.timestamp())
}

/// Anchor of the month containing the epoch-seconds timestamp `ts`.
pub(crate) fn anchor_of_timestamp(ts: i64) -> i64 {
    from_timestamp(ts).map_or(ts, |date| month_anchor(&date))
}

pub(crate) fn from_timestamp(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

pub(crate) fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`; 0 for an invalid month.
pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Calendar month addition. Day-of-month is clamped by chrono when the
/// target month is shorter; `None` when the result is out of range.
pub(crate) fn add_months(date: &DateTime<Utc>, offset: i32) -> Option<DateTime<Utc>> {
    let months = Months::new(offset.unsigned_abs());
    if offset >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    }
}

/// Date of an occurrence in `target`'s month that falls on `origin`'s
/// day-of-month, clamped to the month's last day. Keeps `origin`'s time of day.
///
/// Falls back to the 1st of the month if the clamped date can't be built.
pub(crate) fn occurrence_in_month(
    origin: &DateTime<Utc>,
    target: &DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let (year, month) = (target.year(), target.month());
    let day = origin.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
        .map(|date| date.and_time(origin.time()).and_utc())
}

/// Whole calendar months from anchor `from` to anchor `to`; negative when
/// `to` is earlier.
pub(crate) fn months_between(from: i64, to: i64) -> Option<i32> {
    let (from, to) = (from_timestamp(from)?, from_timestamp(to)?);
    let months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    Some(months)
}

/// `YYYY-MM` label for an anchor.
pub(crate) fn month_label(anchor: i64) -> String {
    from_timestamp(anchor).map_or_else(|| anchor.to_string(), |d| d.format("%Y-%m").to_string())
}

/// Parse a `YYYY-MM` label into the first instant of that month.
pub(crate) fn parse_month(label: &str) -> Option<DateTime<Utc>> {
    let (year, month) = label.trim().split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Parse a `YYYY-MM-DD` date as midnight UTC.
pub(crate) fn parse_day(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}
