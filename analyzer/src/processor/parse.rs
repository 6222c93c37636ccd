//! Tolerant parsing of textual timestamps into second-precision values.
//!
//! Day-first layouts are tried before anything else, so `03/04/2024` is the
//! 3rd of April. Only when every day-first layout fails does the fixed
//! fallback list (which includes the US `mm/dd/yyyy` ordering) get a turn.

use crate::models::{DISPLAY_FORMAT, IssueKind, Timestamp};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use once_cell::sync::Lazy;
use regex::Regex;

/// Day-first layouts, tried in order. `%.f` also accepts a missing fraction.
const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

const DAY_FIRST_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// Explicit formats tried after the day-first pass; first success wins.
pub const FALLBACK_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

static OVERFLOW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<day>\d{1,2})[/-](?P<month>\d{1,2})[/-](?P<year>\d{4})(?:\s+(?P<hour>\d{1,2}):(?P<minute>\d{2}):(?P<second>\d{2})(?:\.\d+)?)?$",
    )
    .expect("Invalid overflow regex")
});

static DATE_SHAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,4}[/.\-]\d{1,2}[/.\-]\d{1,4}").expect("Invalid date shape regex")
});

const NULL_MARKERS: &[&str] = &["", "null", "none", "nan", "n/a", "na"];

/// Empty, NaN-like, or one of the textual null markers.
pub fn is_null_like(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            let lowered = v.trim().to_ascii_lowercase();
            NULL_MARKERS.contains(&lowered.as_str())
        }
    }
}

pub fn truncate_to_second(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(0)
}

pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(DISPLAY_FORMAT).to_string()
}

/// Parses one value; `None` means the value is not a timestamp in any
/// supported layout.
pub fn parse(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    parse_day_first(value)
        .or_else(|| parse_fallback(value))
        .map(truncate_to_second)
}

fn parse_day_first(value: &str) -> Option<NaiveDateTime> {
    DAY_FIRST_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DAY_FIRST_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn parse_fallback(value: &str) -> Option<NaiveDateTime> {
    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Parses a whole column; unparseable and null-like cells become `None`.
pub fn parse_column(values: &[Option<String>]) -> Vec<Option<Timestamp>> {
    values
        .iter()
        .map(|v| match v.as_deref() {
            Some(text) if !is_null_like(Some(text)) => parse(text),
            _ => None,
        })
        .collect()
}

/// Parsed, non-null values in column order.
pub fn parse_valid(values: &[Option<String>]) -> Vec<Timestamp> {
    parse_column(values).into_iter().flatten().collect()
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    (28..=31)
        .rev()
        .find(|day| NaiveDate::from_ymd_opt(year, month, *day).is_some())
}

/// Repairs structurally near-valid `dd/mm/yyyy HH:MM:SS` text: an hour of 24
/// or more rolls into the following days, a day past the end of its month is
/// clamped to the last day. Returns the exact timestamp and which overflow
/// was corrected; `None` if the text is not repairable this way.
pub fn repair_overflow(value: &str) -> Option<(Timestamp, IssueKind)> {
    let caps = OVERFLOW_REGEX.captures(value.trim())?;
    let day: u32 = caps.name("day")?.as_str().parse().ok()?;
    let month: u32 = caps.name("month")?.as_str().parse().ok()?;
    let year: i32 = caps.name("year")?.as_str().parse().ok()?;

    let (hour, minute, second) = match caps.name("hour") {
        Some(h) => (
            h.as_str().parse::<u32>().ok()?,
            caps.name("minute")?.as_str().parse::<u32>().ok()?,
            caps.name("second")?.as_str().parse::<u32>().ok()?,
        ),
        None => (0, 0, 0),
    };

    if day == 0 || !(1..=12).contains(&month) || minute > 59 || second > 59 {
        return None;
    }

    let last_day = last_day_of_month(year, month)?;
    let day_overflow = day > last_day;
    let time_overflow = hour >= 24;
    if !day_overflow && !time_overflow {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day.min(last_day))?;
    let time = NaiveTime::from_hms_opt(hour % 24, minute, second)?;
    let repaired = date.and_time(time) + Duration::days(i64::from(hour / 24));

    let issue = if time_overflow {
        IssueKind::TimeOverflow
    } else {
        IssueKind::DateOverflow
    };
    Some((repaired, issue))
}

/// Why a non-null value failed to parse.
pub fn classify_failure(value: &str) -> IssueKind {
    if let Some((_, issue)) = repair_overflow(value) {
        issue
    } else if DATE_SHAPE_REGEX.is_match(value.trim()) {
        IssueKind::WrongFormat
    } else {
        IssueKind::Unparseable
    }
}
