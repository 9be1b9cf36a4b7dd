// src/table/mod.rs
use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::schema::derive::infer_kind;

/// A single cell as it came out of an export, or after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        n.map_or(Value::Empty, Value::Number)
    }
}

/// Semantic type shared by every non-empty cell of a column.
/// `Raw` marks a column whose cells disagree (e.g. numbers mixed with "2tr").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Number,
    Text,
    DateTime,
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

impl Column {
    /// Build a column, inferring its kind from the cells.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let kind = infer_kind(&values);
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Override the inferred kind, e.g. for an all-empty numeric column.
    pub fn with_kind(mut self, kind: ColumnKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered collection of equally long, named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    /// Errors if the columns do not all share one row count.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                bail!(
                    "table `{}`: column `{}` has {} rows, expected {}",
                    name,
                    bad.name,
                    bad.len(),
                    first.len()
                );
            }
        }
        Ok(Self { name, columns })
    }

    /// Build from a header row plus data rows. Short rows are padded with
    /// empty cells; cells beyond the header width are dropped.
    pub fn from_rows(
        name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let name = name.into();
        if rows.iter().any(|r| r.len() > headers.len()) {
            warn!(
                "table `{}`: some rows have more cells than headers ({} headers)",
                name,
                headers.len()
            );
        }

        let mut cells: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); headers.len()];
        for row in rows {
            let mut row = row.into_iter();
            for col in cells.iter_mut() {
                col.push(row.next().unwrap_or(Value::Empty));
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(h, vals)| Column::new(h, vals))
            .collect();
        Self::new(name, columns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a derived column, or replace an existing one of the same name
    /// in place.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        if !self.columns.is_empty() && column.len() != self.row_count() {
            bail!(
                "table `{}`: derived column `{}` has {} rows, expected {}",
                self.name,
                column.name,
                column.len(),
                self.row_count()
            );
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    /// Rewrite every cell of `name` through `f`, re-inferring the column kind.
    pub fn map_column<F>(self, name: &str, target: &str, mut f: F) -> Result<Self>
    where
        F: FnMut(&Value) -> Result<Value>,
    {
        let source = match self.column(name) {
            Some(c) => c,
            None => bail!("table `{}` has no column `{}`", self.name, name),
        };
        let values = source.values.iter().map(&mut f).collect::<Result<Vec<_>>>()?;
        self.with_column(Column::new(target, values))
    }

    /// Keep only the named columns that exist, in the order given.
    pub fn select(&self, names: &[&str]) -> Table {
        let columns = names
            .iter()
            .filter_map(|n| self.column(n).cloned())
            .collect();
        Table {
            name: self.name.clone(),
            columns,
        }
    }

    /// New table holding the rows at `indices`, in that order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                kind: c.kind,
                values: indices
                    .iter()
                    .filter_map(|&i| c.values.get(i).cloned())
                    .collect(),
            })
            .collect();
        Table {
            name: self.name.clone(),
            columns,
        }
    }

    /// Cell at (`row`, `column`), or `None` when either is out of range.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }
}
