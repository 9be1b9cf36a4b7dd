// src/analysis/mod.rs
use crate::table::Table;

/// One computed metric.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric {
    Number(f64),
    Text(String),
    Table(Table),
    /// The metric could not be computed for this run; the reason says why.
    Unavailable(String),
}

impl Metric {
    pub fn is_available(&self) -> bool {
        !matches!(self, Metric::Unavailable(_))
    }
}

/// Metric name → value, in insertion order. Built up by value: every step
/// takes the result so far and hands back an extended one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    entries: Vec<(String, Metric)>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key`, or overwrite it in place if already present.
    pub fn with(mut self, key: impl Into<String>, metric: Metric) -> Self {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = metric,
            None => self.entries.push((key, metric)),
        }
        self
    }

    pub fn with_number(self, key: impl Into<String>, value: f64) -> Self {
        self.with(key, Metric::Number(value))
    }

    pub fn with_text(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(key, Metric::Text(value.into()))
    }

    pub fn with_table(self, key: impl Into<String>, table: Table) -> Self {
        self.with(key, Metric::Table(table))
    }

    pub fn unavailable(self, key: impl Into<String>, reason: impl Into<String>) -> Self {
        self.with(key, Metric::Unavailable(reason.into()))
    }

    /// Append every entry of `other`, keeping its order.
    pub fn merge(self, other: AnalysisResult) -> Self {
        other
            .entries
            .into_iter()
            .fold(self, |acc, (k, m)| acc.with(k, m))
    }

    pub fn get(&self, key: &str) -> Option<&Metric> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, m)| m)
    }

    pub fn is_available(&self, key: &str) -> bool {
        self.get(key).is_some_and(Metric::is_available)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.entries.iter().map(|(k, m)| (k.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
