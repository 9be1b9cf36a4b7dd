use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// How a raw date cell should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateHint {
    /// Text timestamps in any of the recognized layouts.
    #[default]
    Auto,
    /// Unix seconds, as a number or digit-only text.
    EpochSeconds,
}

/// `YYYY-MM-DD HH:MM:SS` (or ISO `T`-separated) anywhere inside the text.
static EMBEDDED_TS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})[ T](\d{2}:\d{2}:\d{2})").expect("timestamp regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

/// Day-first forms follow the Vietnamese convention; a `DD/MM` vs `MM/DD`
/// ambiguity always resolves day-first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parse a text cell into a naive timestamp.
pub fn parse_datetime(raw: &str, hint: DateHint) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if hint == DateHint::EpochSeconds && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(|secs| {
            DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
        });
    }

    // 1) embedded timestamp, possibly surrounded by descriptive text
    if let Some(caps) = EMBEDDED_TS.captures(s) {
        let joined = format!("{} {}", &caps[1], &caps[2]);
        if let Ok(dt) = NaiveDateTime::parse_from_str(&joined, "%Y-%m-%d %H:%M:%S") {
            return Some(dt);
        }
    }

    // 2) whole-string RFC 3339 with offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    // 3) fixed layouts
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Unix seconds → UTC naive timestamp. Fractions are truncated.
pub fn from_epoch_seconds(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0).map(|dt| dt.naive_utc())
}
