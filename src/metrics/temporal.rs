use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};
use std::collections::BTreeMap;

use super::datetimes;
use crate::table::{Column, Table, Value};

pub const HOUR: &str = "hour";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const ISO_WEEK: &str = "iso_week";
pub const WEEK: &str = "week";

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Monday of the calendar week holding `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Week bucket label, Monday through Sunday: `2024-04-29/2024-05-05`.
pub fn week_label(start: NaiveDate) -> String {
    let end = start + Duration::days(6);
    format!("{}/{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

pub fn iso_week_label(dt: NaiveDateTime) -> String {
    let w = dt.iso_week();
    format!("{}-W{:02}", w.year(), w.week())
}

/// Append `hour`, `day_of_week`, `iso_week` and `week` derived from the
/// timestamp column `date_col`. Rows without a timestamp get empty cells.
pub fn derive_temporal(table: Table, date_col: &str) -> Result<Table> {
    let stamps = datetimes(&table, date_col)?;

    let hours = stamps
        .iter()
        .map(|d| d.map_or(Value::Empty, |d| Value::Number(d.hour() as f64)))
        .collect();
    let days = stamps
        .iter()
        .map(|d| d.map_or(Value::Empty, |d| Value::from(weekday_name(d.weekday()))))
        .collect();
    let iso = stamps
        .iter()
        .map(|d| d.map_or(Value::Empty, |d| Value::Text(iso_week_label(d))))
        .collect();
    let weeks = stamps
        .iter()
        .map(|d| d.map_or(Value::Empty, |d| Value::Text(week_label(week_start(d.date())))))
        .collect();

    table
        .with_column(Column::new(HOUR, hours))?
        .with_column(Column::new(DAY_OF_WEEK, days))?
        .with_column(Column::new(ISO_WEEK, iso))?
        .with_column(Column::new(WEEK, weeks))
}

/// Post counts per hour of day, ascending by hour; hours without posts are
/// left out.
pub fn posts_by_hour(table: &Table, date_col: &str) -> Result<Table> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for dt in datetimes(table, date_col)?.into_iter().flatten() {
        *counts.entry(dt.hour()).or_default() += 1;
    }

    let (hours, posts): (Vec<Value>, Vec<Value>) = counts
        .into_iter()
        .map(|(h, n)| (Value::Number(h as f64), Value::Number(n as f64)))
        .unzip();
    Table::new(
        "posts_by_hour",
        vec![Column::new(HOUR, hours), Column::new("posts", posts)],
    )
}

/// Hour with the most posts; the earliest hour wins a tie.
pub fn peak_hour(by_hour: &Table) -> Option<u32> {
    let hours = by_hour.column(HOUR)?;
    let posts = by_hour.column("posts")?;
    let mut best: Option<(f64, f64)> = None;
    for (h, n) in hours.values.iter().zip(&posts.values) {
        if let (Some(h), Some(n)) = (h.as_f64(), n.as_f64()) {
            if best.map_or(true, |(_, top)| n > top) {
                best = Some((h, n));
            }
        }
    }
    best.map(|(h, _)| h as u32)
}

/// Post counts for Monday through Sunday, zero-filled.
pub fn posts_by_weekday(table: &Table, date_col: &str) -> Result<Table> {
    let mut counts = [0usize; 7];
    for dt in datetimes(table, date_col)?.into_iter().flatten() {
        counts[dt.weekday().num_days_from_monday() as usize] += 1;
    }

    let days = WEEKDAYS.iter().map(|d| Value::from(weekday_name(*d))).collect();
    let posts = counts.iter().map(|n| Value::Number(*n as f64)).collect();
    Table::new(
        "posts_by_weekday",
        vec![Column::new(DAY_OF_WEEK, days), Column::new("posts", posts)],
    )
}

/// Earliest and latest timestamp in the column.
pub fn date_range(table: &Table, date_col: &str) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
    let stamps: Vec<NaiveDateTime> = datetimes(table, date_col)?.into_iter().flatten().collect();
    Ok(stamps
        .iter()
        .min()
        .copied()
        .zip(stamps.iter().max().copied()))
}
