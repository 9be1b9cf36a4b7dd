use anyhow::Result;
use std::cmp::Ordering;

use super::numbers;
use crate::table::Table;

/// First `n` rows of `table` sorted descending by the numeric column `by`.
/// The sort is stable, so equal values keep their original relative order;
/// rows with an empty value go last.
pub fn top_n(table: &Table, by: &str, n: usize) -> Result<Table> {
    let keys = numbers(table, by)?;
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| match (keys[a], keys[b]) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    order.truncate(n);
    Ok(table.take_rows(&order))
}
