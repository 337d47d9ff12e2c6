//! FILENAME: core/engine/src/dates.rs
//! PURPOSE: Date parsing, formatting and calendar arithmetic for cell values.
//! CONTEXT: Source tables arrive as loosely typed text. Temporal filters and
//! date-typed cells all go through `parse_datetime` so that every part of the
//! workspace agrees on what counts as a date.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};

/// Date-only layouts, tried in order. Slash dates are month-first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Time suffixes accepted after any of the date layouts.
const TIME_SUFFIXES: &[&str] = &[
    " %H:%M:%S%.f",
    " %H:%M:%S",
    " %H:%M",
    "T%H:%M:%S%.f",
    "T%H:%M:%S",
    "T%H:%M",
];

/// Canonical ISO-8601 layout used when persisting dates.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses a date or datetime from text. Returns `None` when nothing matches.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    for date_fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, date_fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
        for time_fmt in TIME_SUFFIXES {
            let layout = format!("{}{}", date_fmt, time_fmt);
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, &layout) {
                return Some(dt);
            }
        }
    }

    None
}

/// Formats a datetime for display. Midnight values render as a plain date.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Formats a datetime as unambiguous ISO-8601 text.
pub fn to_iso(dt: &NaiveDateTime) -> String {
    dt.format(ISO_FORMAT).to_string()
}

/// Returns the (year, month) that is `delta` months away from `date`.
pub fn shift_month(date: NaiveDate, delta: i32) -> (i32, u32) {
    let index = date.year() * 12 + date.month0() as i32 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// True when `dt` falls in the given calendar month.
pub fn in_month(dt: &NaiveDateTime, year: i32, month: u32) -> bool {
    dt.year() == year && dt.month() == month
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_layouts() {
        let midnight = ymd(2024, 1, 5).and_time(NaiveTime::MIN);
        assert_eq!(parse_datetime("2024-01-05"), Some(midnight));
        assert_eq!(parse_datetime("2024/01/05"), Some(midnight));
        assert_eq!(parse_datetime("01/05/2024"), Some(midnight));

        let with_time = ymd(2024, 1, 5).and_hms_opt(13, 45, 0).unwrap();
        assert_eq!(parse_datetime("2024-01-05 13:45"), Some(with_time));
        assert_eq!(parse_datetime("2024-01-05T13:45:00"), Some(with_time));
        assert_eq!(parse_datetime("2024-01-05T13:45:00+05:00"), Some(with_time));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_datetime("soon"), None);
        assert_eq!(parse_datetime("0000-00-00"), None);
        assert_eq!(parse_datetime(""), None);
    }

    #[test]
    fn shift_month_wraps_years() {
        assert_eq!(shift_month(ymd(2024, 1, 31), -1), (2023, 12));
        assert_eq!(shift_month(ymd(2024, 12, 1), 1), (2025, 1));
        assert_eq!(shift_month(ymd(2024, 6, 15), 0), (2024, 6));
    }

    #[test]
    fn iso_round_trips() {
        let dt = ymd(2023, 11, 2).and_hms_opt(8, 30, 15).unwrap();
        assert_eq!(to_iso(&dt), "2023-11-02T08:30:15");
        assert_eq!(parse_datetime(&to_iso(&dt)), Some(dt));
    }
}
