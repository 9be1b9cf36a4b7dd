use anyhow::Result;

use super::numbers;
use crate::table::{Column, Table, Value};

/// `interactions / views × 100`; zero views give a rate of 0.
pub fn engagement_rate(interactions: f64, views: f64) -> f64 {
    if views == 0.0 || !views.is_finite() || !interactions.is_finite() {
        0.0
    } else {
        interactions / views * 100.0
    }
}

/// Append a per-row rate column `target`. A row missing either operand (an
/// excluded cell) gets an empty rate.
pub fn with_engagement_rate(
    table: Table,
    interactions_col: &str,
    views_col: &str,
    target: &str,
) -> Result<Table> {
    let interactions = numbers(&table, interactions_col)?;
    let views = numbers(&table, views_col)?;
    let rates = interactions
        .into_iter()
        .zip(views)
        .map(|pair| match pair {
            (Some(i), Some(v)) => Value::Number(engagement_rate(i, v)),
            _ => Value::Empty,
        })
        .collect();
    table.with_column(Column::new(target, rates))
}
