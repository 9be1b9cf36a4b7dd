//! Tolerant column and sheet discovery over exports whose headers drift
//! between tool versions and locales.

pub mod aliases;
pub mod derive;

use tracing::debug;

use crate::table::Table;

/// How a `ColumnSpec`'s aliases are compared with real header names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Aliases are tried in priority order; a header matches when it equals
    /// the alias, ignoring case and surrounding whitespace.
    Exact,
    /// Headers are scanned in table order; the first header containing any
    /// alias as a case-insensitive substring wins.
    Contains,
}

/// A canonical metric name and the raw header names accepted for it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    pub mode: MatchMode,
}

impl ColumnSpec {
    pub const fn exact(canonical: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            canonical,
            aliases,
            mode: MatchMode::Exact,
        }
    }

    pub const fn contains(canonical: &'static str, keywords: &'static [&'static str]) -> Self {
        Self {
            canonical,
            aliases: keywords,
            mode: MatchMode::Contains,
        }
    }

    /// Index of the matching header in `names`, if any.
    pub fn position<S: AsRef<str>>(&self, names: &[S]) -> Option<usize> {
        match self.mode {
            MatchMode::Exact => self.aliases.iter().find_map(|alias| {
                let alias = alias.trim().to_lowercase();
                names
                    .iter()
                    .position(|n| n.as_ref().trim().to_lowercase() == alias)
            }),
            MatchMode::Contains => {
                let keywords: Vec<String> = self.aliases.iter().map(|k| k.to_lowercase()).collect();
                names.iter().position(|n| {
                    let lower = n.as_ref().to_lowercase();
                    keywords.iter().any(|k| lower.contains(k.as_str()))
                })
            }
        }
    }
}

/// Resolve `spec` against `table`'s headers. `None` means the feature that
/// needs this column is unavailable for this source.
pub fn resolve_column<'t>(table: &'t Table, spec: &ColumnSpec) -> Option<&'t str> {
    let names = table.column_names();
    match spec.position(&names) {
        Some(idx) => {
            let name = table.columns()[idx].name.as_str();
            debug!(table = table.name(), canonical = spec.canonical, column = name, "resolved column");
            Some(name)
        }
        None => {
            debug!(
                table = table.name(),
                canonical = spec.canonical,
                available = ?names,
                "column unresolved"
            );
            None
        }
    }
}

/// Resolve a sheet by listed alias. An exact name wins over a match that only
/// differs by whitespace or case (exports ship both `"Data Product "` and
/// `"Data Product"`).
pub fn resolve_sheet<'s>(sheet_names: &'s [String], aliases: &[&str]) -> Option<&'s str> {
    aliases
        .iter()
        .find_map(|alias| sheet_names.iter().find(|s| s.as_str() == *alias))
        .or_else(|| {
            aliases.iter().find_map(|alias| {
                let alias = alias.trim().to_lowercase();
                sheet_names.iter().find(|s| s.trim().to_lowercase() == alias)
            })
        })
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Value};

    fn table(headers: &[&str]) -> Table {
        let cols = headers
            .iter()
            .map(|h| Column::new(*h, vec![Value::Empty]))
            .collect();
        Table::new("t", cols).unwrap()
    }

    #[test]
    fn keyword_resolution_is_case_insensitive() {
        let t = table(&["Ngày", "Lượt xem"]);
        let spec = ColumnSpec::contains("date", &["date", "ngày", "time"]);
        assert_eq!(resolve_column(&t, &spec), Some("Ngày"));
    }

    #[test]
    fn keyword_resolution_scans_table_order() {
        let t = table(&["Profile", "Total engagement", "Date"]);
        let spec = ColumnSpec::contains("date", &["time", "date"]);
        assert_eq!(resolve_column(&t, &spec), Some("Date"));

        let t = table(&["Timestamp", "Date"]);
        assert_eq!(resolve_column(&t, &spec), Some("Timestamp"));
    }

    #[test]
    fn exact_resolution_follows_alias_priority() {
        let t = table(&["Date", "Ngày đăng"]);
        let spec = ColumnSpec::exact("video_date", &["Thời gian phát hành", "Ngày đăng", "Date"]);
        assert_eq!(resolve_column(&t, &spec), Some("Ngày đăng"));

        let t = table(&["Ngày đăng xxx"]);
        assert_eq!(resolve_column(&t, &spec), None);
    }

    #[test]
    fn sheet_resolution_prefers_exact_names() {
        let sheets = vec!["Data Video".to_string(), "data product".to_string()];
        assert_eq!(
            resolve_sheet(&sheets, &["Data Product ", "Data Product", "Product"]),
            Some("data product")
        );
        assert_eq!(resolve_sheet(&sheets, &["Data Livestream"]), None);

        let sheets = vec!["Data Product".to_string(), "Data Product ".to_string()];
        assert_eq!(
            resolve_sheet(&sheets, &["Data Product ", "Data Product"]),
            Some("Data Product ")
        );
    }
}
