// src/normalize/mod.rs

//! Vietnamese-locale scalar parsing: `.` groups thousands, `,` marks the
//! decimal, and magnitudes are often abbreviated (`2tr`, `1,5k`, `3 tỷ`).

pub mod date_parser;

use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::table::Value;

pub use date_parser::DateHint;

/// Unit suffixes, checked in order by substring match. Longer tokens come
/// before the shorter ones they overlap with.
const UNIT_SUFFIXES: &[(&str, f64)] = &[
    ("tỷ", 1e9),
    ("triệu", 1e6),
    ("tr", 1e6),
    ("m", 1e6),
    ("nghìn", 1e3),
    ("k", 1e3),
];

const CURRENCY_MARKERS: &[&str] = &["₫", "vnđ", "vnd", "đ"];

/// What an unparseable numeric cell turns into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailure {
    /// Silent, lossy: the cell counts as 0.
    #[default]
    Zero,
    /// The cell becomes empty and drops out of sums and means.
    Exclude,
    /// The cell is an error; the metric depending on it is skipped.
    Strict,
}

/// Trim whitespace and strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a locale-formatted number such as `"1.234,56"`, `"2tr"` or
/// `"1,5 triệu"`. Returns `None` when the text is not a number.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s: String = clean_str(raw)
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let s = s.strip_suffix('%').unwrap_or(&s);
    if s.is_empty() {
        return None;
    }

    for (suffix, multiplier) in UNIT_SUFFIXES {
        if s.contains(suffix) {
            return s
                .replace(suffix, "")
                .parse::<f64>()
                .ok()
                .map(|n| n * multiplier)
                .filter(|n| n.is_finite());
        }
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// As [`parse_number`], after removing a currency marker (`₫`, `VND`, `đ`).
pub fn parse_currency(raw: &str) -> Option<f64> {
    let mut s = raw.to_lowercase();
    for marker in CURRENCY_MARKERS {
        s = s.replace(marker, "");
    }
    parse_number(&s)
}

/// Dot-decimal reading for exports from English-locale tools (Fanpage
/// Karma): `,` groups thousands and a trailing `%` is dropped. Unit suffixes
/// are not recognized.
pub fn parse_plain_number(raw: &str) -> Option<f64> {
    let s: String = clean_str(raw)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let s = s.strip_suffix('%').unwrap_or(&s);
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric input is returned unchanged; text is parsed with [`parse_number`].
/// Anything unparseable yields `0`.
pub fn normalize_number(raw: &Value) -> f64 {
    number_with(raw, parse_number).unwrap_or(0.0)
}

/// Currency flavour of [`normalize_number`].
pub fn normalize_currency(raw: &Value) -> f64 {
    number_with(raw, parse_currency).unwrap_or(0.0)
}

/// Calendar timestamp for `raw`, or `None` when it holds no recognizable
/// date. Absence is never collapsed into a default date.
pub fn normalize_datetime(raw: &Value, hint: DateHint) -> Option<NaiveDateTime> {
    match raw {
        Value::DateTime(dt) => Some(*dt),
        Value::Number(n) => match hint {
            DateHint::EpochSeconds => date_parser::from_epoch_seconds(*n),
            DateHint::Auto => None,
        },
        Value::Text(s) => date_parser::parse_datetime(s, hint),
        Value::Empty | Value::Bool(_) => None,
    }
}

fn number_with(raw: &Value, parse: fn(&str) -> Option<f64>) -> Option<f64> {
    match raw {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => parse(s),
        Value::Empty | Value::DateTime(_) => None,
    }
}

/// Applies a [`ParseFailure`] policy on top of the lenient parsers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    pub on_failure: ParseFailure,
}

impl Normalizer {
    pub fn new(on_failure: ParseFailure) -> Self {
        Self { on_failure }
    }

    /// `Ok(None)` only under [`ParseFailure::Exclude`].
    pub fn number(&self, raw: &Value) -> Result<Option<f64>> {
        self.apply(raw, number_with(raw, parse_number))
    }

    pub fn currency(&self, raw: &Value) -> Result<Option<f64>> {
        self.apply(raw, number_with(raw, parse_currency))
    }

    pub fn plain(&self, raw: &Value) -> Result<Option<f64>> {
        self.apply(raw, number_with(raw, parse_plain_number))
    }

    fn apply(&self, raw: &Value, parsed: Option<f64>) -> Result<Option<f64>> {
        match (parsed, self.on_failure) {
            (Some(n), _) => Ok(Some(n)),
            (None, ParseFailure::Zero) => Ok(Some(0.0)),
            (None, ParseFailure::Exclude) => Ok(None),
            (None, ParseFailure::Strict) => bail!("unparseable numeric value `{}`", raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn comma_decimal_dot_thousands() {
        assert_eq!(normalize_number(&text("1.234,56")), 1234.56);
        assert_eq!(normalize_number(&text(" 12.000 ")), 12000.0);
        assert_eq!(normalize_number(&text("3,5%")), 3.5);
    }

    #[test]
    fn unit_suffixes() {
        assert_eq!(normalize_number(&text("2tr")), 2_000_000.0);
        assert_eq!(normalize_number(&text("2triệu")), 2_000_000.0);
        assert_eq!(normalize_number(&text("2 Triệu")), 2_000_000.0);
        assert_eq!(normalize_number(&text("2M")), 2_000_000.0);
        assert_eq!(normalize_number(&text("2k")), 2000.0);
        assert_eq!(normalize_number(&text("2nghìn")), 2000.0);
        assert_eq!(normalize_number(&text("2tỷ")), 2_000_000_000.0);
        assert_eq!(normalize_number(&text("1,5k")), 1500.0);
    }

    #[test]
    fn numeric_input_passes_through() {
        assert_eq!(normalize_number(&Value::Number(42.5)), 42.5);
    }

    #[test]
    fn unparseable_number_is_zero() {
        assert_eq!(normalize_number(&text("abc")), 0.0);
        assert_eq!(normalize_number(&text("")), 0.0);
        assert_eq!(normalize_number(&Value::Empty), 0.0);
        // f64 parsing accepts these spellings; a suffix must not let them through
        assert_eq!(normalize_number(&text("nank")), 0.0);
        assert_eq!(normalize_number(&text("infm")), 0.0);
        assert_eq!(normalize_number(&text("inf")), 0.0);
        assert!(Normalizer::new(ParseFailure::Strict).number(&text("infm")).is_err());
    }

    #[test]
    fn currency_markers_are_stripped() {
        assert_eq!(normalize_currency(&text("1.500.000 ₫")), 1_500_000.0);
        assert_eq!(normalize_currency(&text("₫2,5tr")), 2_500_000.0);
        assert_eq!(normalize_currency(&text("300k VND")), 300_000.0);
        assert_eq!(normalize_currency(&text("free")), 0.0);
    }

    #[test]
    fn plain_numbers_use_dot_decimals() {
        assert_eq!(parse_plain_number("0.0123"), Some(0.0123));
        assert_eq!(parse_plain_number(" 1,234.5 "), Some(1234.5));
        assert_eq!(parse_plain_number("2.5%"), Some(2.5));
        assert_eq!(parse_plain_number("2k"), None);
        assert_eq!(parse_plain_number("nan"), None);
        assert_eq!(
            Normalizer::new(ParseFailure::Exclude).plain(&text("n/a")).unwrap(),
            None
        );
    }

    #[test]
    fn policy_controls_failures() {
        let bad = text("n/a");
        assert_eq!(Normalizer::new(ParseFailure::Zero).number(&bad).unwrap(), Some(0.0));
        assert_eq!(Normalizer::new(ParseFailure::Exclude).number(&bad).unwrap(), None);
        assert!(Normalizer::new(ParseFailure::Strict).number(&bad).is_err());
        assert_eq!(
            Normalizer::new(ParseFailure::Strict).currency(&text("2tr ₫")).unwrap(),
            Some(2_000_000.0)
        );
    }

    #[test]
    fn datetime_embedded_in_text() {
        let dt = normalize_datetime(
            &text("Recorded at 2024-05-01 10:00:00 by device X"),
            DateHint::Auto,
        );
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(dt, Some(expected));
        assert_eq!(normalize_datetime(&text("n/a"), DateHint::Auto), None);
        assert_eq!(normalize_datetime(&Value::Empty, DateHint::Auto), None);
    }

    #[test]
    fn datetime_from_epoch_seconds() {
        let dt = normalize_datetime(&Value::Number(1_714_557_600.0), DateHint::EpochSeconds);
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(dt, Some(expected));
        assert_eq!(
            normalize_datetime(&Value::Number(1_714_557_600.0), DateHint::Auto),
            None
        );
    }
}
