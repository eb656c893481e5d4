//! Bulletin timestamps such as `01 November 2025 - 04:12 PM`.
//!
//! The bulletin prints local civil time at a fixed offset from UTC (no DST),
//! so conversion is a constant shift. Every failure yields `None`; callers
//! skip the row.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})\s*([AaPp])\.?\s*[Mm]\.?$").expect("valid time regex")
});

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

fn month_ordinal(name: &str) -> Option<u32> {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    MONTHS
        .iter()
        .find(|(m, _)| *m == name)
        .map(|(_, ordinal)| *ordinal)
}

fn parse_date(segment: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = segment.split_whitespace().collect();
    if parts.len() != 3 {
        return None;
    }
    let day: u32 = parts[0].parse().ok()?;
    let month = month_ordinal(parts[1])?;
    let year: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Returns `(hour24, minute)` for a 12-hour clock reading.
fn parse_time(segment: &str) -> Option<(u32, u32)> {
    let caps = TIME_RE.captures(segment.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }
    let pm = caps[3].eq_ignore_ascii_case("p");
    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    Some((hour24, minute))
}

/// Parses a bulletin timestamp printed at `utc_offset_hours` ahead of UTC.
pub fn parse_bulletin_datetime(text: &str, utc_offset_hours: i32) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = text.split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let date = parse_date(parts[0])?;
    let (hour, minute) = parse_time(parts[1])?;
    let naive = date.and_hms_opt(hour, minute, 0)?;
    let as_if_utc = Utc.from_utc_datetime(&naive);
    Some(as_if_utc - Duration::hours(i64::from(utc_offset_hours)))
}
