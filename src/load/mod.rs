// src/load/mod.rs
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::normalize::{clean_str, date_parser, DateHint};
use crate::table::{Table, Value};

/// How many leading rows are searched for the header.
const HEADER_SCAN_ROWS: usize = 10;

/// A workbook (or CSV export) plus an optional sheet and header position.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub path: PathBuf,
    pub sheet: Option<String>,
    /// Zero-based row holding the headers; detected when `None`.
    pub header_row: Option<usize>,
}

impl SourceRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
            header_row: None,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_header_row(mut self, row: usize) -> Self {
        self.header_row = Some(row);
        self
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "table".to_string())
}

/// Check `path`. `Ok(false)` when it does not exist; `Err` for any other I/O
/// failure, which is not specific to one source and aborts the run.
fn source_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("reading metadata of {}", path.display())),
    }
}

/// List the sheets of a workbook. CSV files expose one sheet named after the
/// file. Any failure yields an empty list.
pub fn sheet_names(path: &Path) -> Vec<String> {
    if is_csv(path) {
        return if path.is_file() {
            vec![file_stem(path)]
        } else {
            Vec::new()
        };
    }
    match open_workbook_auto(path) {
        Ok(wb) => wb.sheet_names(),
        Err(e) => {
            warn!(path = %path.display(), "cannot list sheets: {}", e);
            Vec::new()
        }
    }
}

/// Read `source` into a [`Table`].
///
/// Missing files, missing sheets, empty sheets and malformed workbooks all
/// come back as `Ok(None)` with a warning; the caller skips whatever depended
/// on this source. Only I/O failures unrelated to one source are `Err`.
#[tracing::instrument(level = "info", skip(source), fields(path = %source.path.display(), sheet = ?source.sheet))]
pub fn load(source: &SourceRef) -> Result<Option<Table>> {
    if !source_exists(&source.path)? {
        warn!("source file not found");
        return Ok(None);
    }

    let rows = if is_csv(&source.path) {
        read_csv_rows(&source.path)
    } else {
        read_workbook_rows(&source.path, source.sheet.as_deref())
    };
    let (sheet, rows) = match rows {
        Some(r) => r,
        None => return Ok(None),
    };

    let header_idx = match source.header_row.or_else(|| detect_header_row(&rows)) {
        Some(idx) if idx < rows.len() => idx,
        _ => {
            warn!(sheet = %sheet, "sheet is empty or has no header row");
            return Ok(None);
        }
    };

    let mut rows = rows;
    let data = rows.split_off(header_idx + 1);
    let header_cells = rows.pop().unwrap_or_default();
    let headers = header_names(&header_cells);
    debug!(header_row = header_idx, ?headers, "headers");

    let name = format!("{}/{}", file_stem(&source.path), sheet);
    let table = Table::from_rows(name, headers, data)?;
    info!(
        rows = table.row_count(),
        columns = table.columns().len(),
        "loaded table"
    );
    Ok(Some(table))
}

/// `(sheet name, rows)` of the requested sheet, or of the first sheet when
/// none is requested.
fn read_workbook_rows(path: &Path, sheet: Option<&str>) -> Option<(String, Vec<Vec<Value>>)> {
    let mut workbook = match open_workbook_auto(path) {
        Ok(wb) => wb,
        Err(e) => {
            warn!("malformed workbook: {}", e);
            return None;
        }
    };

    let available = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(s) if available.iter().any(|a| a == s) => s.to_string(),
        Some(s) => {
            warn!(requested = s, ?available, "sheet not found");
            return None;
        }
        None => match available.first() {
            Some(first) => first.clone(),
            None => {
                warn!("workbook has no sheets");
                return None;
            }
        },
    };

    let range = match workbook.worksheet_range(&sheet_name) {
        Ok(r) => r,
        Err(e) => {
            warn!(sheet = %sheet_name, "cannot read sheet: {}", e);
            return None;
        }
    };

    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    Some((sheet_name, rows))
}

fn read_csv_rows(path: &Path) -> Option<(String, Vec<Vec<Value>>)> {
    let mut rdr = match ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(r) => r,
        Err(e) => {
            warn!("cannot open CSV: {}", e);
            return None;
        }
    };

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        match record {
            Ok(rec) => rows.push(rec.iter().map(text_value).collect()),
            Err(e) => {
                warn!(record = idx, "malformed CSV: {}", e);
                return None;
            }
        }
    }
    Some((file_stem(path), rows))
}

fn text_value(raw: &str) -> Value {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        Value::Empty
    } else {
        Value::Text(cleaned)
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) => text_value(s),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map_or(Value::Empty, Value::DateTime),
        Data::DateTimeIso(s) => date_parser::parse_datetime(s, DateHint::Auto)
            .map_or_else(|| text_value(s), Value::DateTime),
        Data::DurationIso(s) => text_value(s),
        Data::Error(_) | Data::Empty => Value::Empty,
    }
}

/// First of the leading rows whose filled cells cover at least half the
/// sheet width. Title rows above the real header are skipped this way.
pub fn detect_header_row(rows: &[Vec<Value>]) -> Option<usize> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return None;
    }
    rows.iter().take(HEADER_SCAN_ROWS).position(|row| {
        let filled = row.iter().filter(|v| !v.is_empty()).count();
        filled > 0 && filled * 2 >= width
    })
}

fn header_names(cells: &[Value]) -> Vec<String> {
    cells
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let name = v.to_string();
            let name = name.trim();
            if name.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name.to_string()
            }
        })
        .collect()
}
