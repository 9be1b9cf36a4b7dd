//! Stateless transforms over normalized tables. Each function either returns
//! a new table / value or an error naming the missing column; nothing here
//! logs or skips on its own, that is the pipeline's job.

pub mod aggregate;
pub mod engagement;
pub mod hashtags;
pub mod rank;
pub mod temporal;

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;

use crate::normalize::{normalize_datetime, DateHint, Normalizer};
use crate::table::{Column, Table, Value};

/// How textual numbers in a column are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// Vietnamese convention with unit suffixes.
    Count,
    Currency,
    /// Dot-decimal, as English-locale tools write it.
    Plain,
}

/// Number of rows kept by the top-N style metrics.
pub const TOP_N: usize = 10;

pub(crate) fn column<'t>(table: &'t Table, name: &str) -> Result<&'t Column> {
    table
        .column(name)
        .ok_or_else(|| anyhow!("table `{}` has no column `{}`", table.name(), name))
}

/// Numeric view of a column; empty or non-numeric cells are `None`.
pub fn numbers(table: &Table, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(column(table, name)?
        .values
        .iter()
        .map(|v| v.as_f64().filter(|n| !n.is_nan()))
        .collect())
}

/// Datetime view of a column; cells that are not timestamps are `None`.
pub fn datetimes(table: &Table, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    Ok(column(table, name)?
        .values
        .iter()
        .map(Value::as_datetime)
        .collect())
}

/// Normalize `source` into `target` (which may be the same column) so every
/// cell is a number, or empty when the policy excludes it.
pub fn normalize_numeric(
    table: Table,
    source: &str,
    target: &str,
    kind: NumericKind,
    normalizer: &Normalizer,
) -> Result<Table> {
    table.map_column(source, target, |v| {
        let parsed = match kind {
            NumericKind::Count => normalizer.number(v),
            NumericKind::Currency => normalizer.currency(v),
            NumericKind::Plain => normalizer.plain(v),
        };
        parsed
            .map(Value::from)
            .map_err(|e| e.context(format!("column `{}`", source)))
    })
}

/// Replace `name` with parsed timestamps; unparseable cells become empty.
pub fn parse_datetime_column(table: Table, name: &str, hint: DateHint) -> Result<Table> {
    table.map_column(name, name, |v| {
        Ok(normalize_datetime(v, hint).map_or(Value::Empty, Value::DateTime))
    })
}

/// Sum of the non-empty numeric cells.
pub fn sum(table: &Table, name: &str) -> Result<f64> {
    Ok(numbers(table, name)?.into_iter().flatten().sum())
}

/// Mean of the non-empty numeric cells, `None` when there are none.
pub fn mean(table: &Table, name: &str) -> Result<Option<f64>> {
    let vals: Vec<f64> = numbers(table, name)?.into_iter().flatten().collect();
    if vals.is_empty() {
        Ok(None)
    } else {
        Ok(Some(vals.iter().sum::<f64>() / vals.len() as f64))
    }
}
