//! Date and timestamp utilities
//!
//! Source CSVs mix plain dates, hourly timestamps and RFC 3339 strings.
//! Everything is normalised to a calendar day before alignment.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a date or timestamp string and normalise it to its calendar day.
///
/// Returns `None` for blank or unparseable input; callers drop such rows.
/// Offset-carrying timestamps keep the calendar day of their own offset.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|dt| dt.date())
}

/// Whole days from `from` to `to` (negative when `to` precedes `from`)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Every calendar day from `start` to `end`, both inclusive
pub fn daily_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}
