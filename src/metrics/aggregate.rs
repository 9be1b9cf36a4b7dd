use anyhow::Result;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use super::engagement::engagement_rate;
use super::temporal::{week_label, week_start, WEEK};
use super::{column, datetimes, numbers};
use crate::table::{Column, Table, Value};

/// A percentage derived from summed columns:
/// `sum(numerators) / denominator × 100`.
#[derive(Debug, Clone)]
pub struct Ratio {
    pub name: String,
    pub numerators: Vec<String>,
    pub denominator: String,
}

impl Ratio {
    pub fn new(name: &str, numerators: &[&str], denominator: &str) -> Self {
        Self {
            name: name.to_string(),
            numerators: numerators.iter().map(|s| s.to_string()).collect(),
            denominator: denominator.to_string(),
        }
    }
}

/// Group rows into Monday-based calendar weeks of `date_col`, sum each of
/// `sums`, then derive each ratio from the weekly sums. Rows without a
/// timestamp are dropped. Ratios whose operands are not all summed are
/// skipped.
pub fn weekly(table: &Table, date_col: &str, sums: &[&str], ratios: &[Ratio]) -> Result<Table> {
    let stamps = datetimes(table, date_col)?;
    let values = sums
        .iter()
        .map(|c| numbers(table, c))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (row, stamp) in stamps.iter().enumerate() {
        let Some(stamp) = stamp else { continue };
        let acc = groups
            .entry(week_start(stamp.date()))
            .or_insert_with(|| vec![0.0; sums.len()]);
        for (slot, col) in acc.iter_mut().zip(&values) {
            *slot += col[row].unwrap_or(0.0);
        }
    }

    let mut columns = vec![Column::new(
        WEEK,
        groups.keys().map(|w| Value::Text(week_label(*w))).collect(),
    )];
    for (i, name) in sums.iter().enumerate() {
        columns.push(Column::new(
            *name,
            groups.values().map(|acc| Value::Number(acc[i])).collect(),
        ));
    }

    let position = |name: &str| sums.iter().position(|s| *s == name);
    for ratio in ratios {
        let numerators: Option<Vec<usize>> =
            ratio.numerators.iter().map(|n| position(n.as_str())).collect();
        let (Some(numerators), Some(denominator)) = (numerators, position(ratio.denominator.as_str()))
        else {
            continue;
        };
        let rates = groups
            .values()
            .map(|acc| {
                let num: f64 = numerators.iter().map(|&i| acc[i]).sum();
                Value::Number(engagement_rate(num, acc[denominator]))
            })
            .collect();
        columns.push(Column::new(ratio.name.as_str(), rates));
    }

    Table::new(format!("{}_weekly", table.name()), columns)
}

/// Per-day sums of `value_col`, keyed by the calendar date of `date_col`.
pub fn daily_sum(table: &Table, date_col: &str, value_col: &str) -> Result<BTreeMap<NaiveDate, f64>> {
    let stamps = datetimes(table, date_col)?;
    let values = numbers(table, value_col)?;
    let mut out = BTreeMap::new();
    for (stamp, value) in stamps.into_iter().zip(values) {
        if let Some(stamp) = stamp {
            *out.entry(stamp.date()).or_insert(0.0) += value.unwrap_or(0.0);
        }
    }
    Ok(out)
}

/// A daily series as a `(date, value_name)` table, oldest day first.
pub fn daily_table(value_name: &str, series: &BTreeMap<NaiveDate, f64>) -> Result<Table> {
    let dates = series
        .keys()
        .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
        .collect();
    let values = series.values().map(|v| Value::Number(*v)).collect();
    Table::new(
        format!("daily_{}", value_name),
        vec![Column::new("date", dates), Column::new(value_name, values)],
    )
}

/// Outer join of two daily series on date. Days missing from one side are
/// empty in that column.
pub fn compare_daily(
    left_name: &str,
    left: &BTreeMap<NaiveDate, f64>,
    right_name: &str,
    right: &BTreeMap<NaiveDate, f64>,
) -> Result<Table> {
    let mut days: Vec<NaiveDate> = left.keys().chain(right.keys()).copied().collect();
    days.sort();
    days.dedup();

    let dates = days
        .iter()
        .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
        .collect();
    let lhs = days.iter().map(|d| Value::from(left.get(d).copied())).collect();
    let rhs = days.iter().map(|d| Value::from(right.get(d).copied())).collect();
    Table::new(
        "daily_comparison",
        vec![
            Column::new("date", dates),
            Column::new(left_name, lhs),
            Column::new(right_name, rhs),
        ],
    )
}

/// Mean of `value_col` per distinct value of `category_col`, sorted by mean
/// descending and cut to `n` groups. Equal means keep first-seen group
/// order; rows with an empty category or value are ignored.
pub fn category_means(table: &Table, category_col: &str, value_col: &str, n: usize) -> Result<Table> {
    let categories = &column(table, category_col)?.values;
    let values = numbers(table, value_col)?;

    let mut order: Vec<(String, f64, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (cat, value) in categories.iter().zip(values) {
        let Some(value) = value else { continue };
        if cat.is_empty() {
            continue;
        }
        let key = cat.to_string();
        match index.get(&key) {
            Some(&i) => {
                order[i].1 += value;
                order[i].2 += 1;
            }
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, value, 1));
            }
        }
    }

    let mut means: Vec<(String, f64)> = order
        .into_iter()
        .map(|(k, total, count)| (k, total / count as f64))
        .collect();
    means.sort_by(|a, b| b.1.total_cmp(&a.1));
    means.truncate(n);

    let (names, avgs): (Vec<Value>, Vec<Value>) = means
        .into_iter()
        .map(|(k, m)| (Value::Text(k), Value::Number(m)))
        .unzip();
    Table::new(
        "category_means",
        vec![
            Column::new(category_col, names),
            Column::new(format!("{} (mean)", value_col), avgs),
        ],
    )
}
