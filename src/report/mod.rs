// src/report/mod.rs
use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray, TimestampMillisecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::{
    collections::HashSet,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisResult, Metric};
use crate::table::{Column, ColumnKind, Table, Value};

/// Sheet names follow the spreadsheet limit.
const MAX_SHEET_NAME: usize = 31;

pub const SUMMARY_FILE: &str = "summary.parquet";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
}

/// Everything one run exports: a sheet per table metric plus the flattened
/// `(metric, value)` summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportBundle {
    pub sheets: Vec<Sheet>,
    pub summary: Table,
}

#[derive(Debug, Serialize)]
struct Manifest {
    generated_at: DateTime<Utc>,
    sheets: Vec<ManifestSheet>,
    summary: &'static str,
}

#[derive(Debug, Serialize)]
struct ManifestSheet {
    name: String,
    file: String,
    rows: usize,
    columns: Vec<String>,
}

/// Compose the bundle from `result`, preserving its insertion order.
pub fn assemble(result: &AnalysisResult) -> Result<ReportBundle> {
    let mut sheets = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut metrics = Vec::with_capacity(result.len());
    let mut values = Vec::with_capacity(result.len());
    let mut numbers = Vec::with_capacity(result.len());

    for (key, metric) in result.iter() {
        let (value, number) = match metric {
            Metric::Number(n) => (format_number(*n), Value::Number(*n)),
            Metric::Text(s) => (s.clone(), Value::Empty),
            Metric::Unavailable(reason) => (format!("unavailable: {}", reason), Value::Empty),
            Metric::Table(table) => {
                // a table without columns cannot be written as a sheet
                if !table.columns().is_empty() {
                    let name = unique_sheet_name(key, &mut used);
                    sheets.push(Sheet {
                        name,
                        table: table.clone(),
                    });
                }
                (format!("{} rows", table.row_count()), Value::Number(table.row_count() as f64))
            }
        };
        metrics.push(Value::from(key));
        values.push(Value::Text(value));
        numbers.push(number);
    }

    let summary = Table::new(
        "summary",
        vec![
            Column::new("metric", metrics),
            Column::new("value", values),
            Column::new("number", numbers).with_kind(ColumnKind::Number),
        ],
    )?;
    Ok(ReportBundle { sheets, summary })
}

/// Integral values print without decimals, everything else with two.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{:.2}", n)
    }
}

fn unique_sheet_name(key: &str, used: &mut HashSet<String>) -> String {
    let base: String = key
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME)
        .collect();

    let mut name = base.clone();
    let mut n = 2;
    while !used.insert(name.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        name = base.chars().take(keep).collect::<String>() + &suffix;
        n += 1;
    }
    name
}

fn file_name_for(index: usize, sheet: &str) -> String {
    let slug: String = sheet
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{:02}_{}.parquet", index + 1, slug)
}

/// Arrow view of a table: numbers as Float64, timestamps as millisecond
/// timestamps, everything else as text. Empty cells become nulls.
pub fn table_to_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns().len());

    for col in table.columns() {
        match col.kind {
            ColumnKind::Number => {
                fields.push(Field::new(&col.name, DataType::Float64, true));
                let arr: Float64Array = col.values.iter().map(Value::as_f64).collect();
                arrays.push(Arc::new(arr));
            }
            ColumnKind::DateTime => {
                fields.push(Field::new(
                    &col.name,
                    DataType::Timestamp(TimeUnit::Millisecond, None),
                    true,
                ));
                let arr: TimestampMillisecondArray = col
                    .values
                    .iter()
                    .map(|v| v.as_datetime().map(|d| d.and_utc().timestamp_millis()))
                    .collect();
                arrays.push(Arc::new(arr));
            }
            ColumnKind::Text | ColumnKind::Raw => {
                fields.push(Field::new(&col.name, DataType::Utf8, true));
                let arr: StringArray = col
                    .values
                    .iter()
                    .map(|v| (!v.is_empty()).then(|| v.to_string()))
                    .collect();
                arrays.push(Arc::new(arr));
            }
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .with_context(|| format!("building record batch for `{}`", table.name()))
}

fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let batch = table_to_batch(table)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer
        .write(&batch)
        .with_context(|| format!("writing {}", path.display()))?;
    writer.close().context("closing Arrow writer")?;
    Ok(())
}

/// Rename `staging` to `out_dir`. A previous export is first moved aside and
/// only deleted after the new one is in place; if the rename fails it is
/// moved back.
fn swap_into_place(staging: &Path, out_dir: &Path) -> Result<()> {
    let backup = staging.with_extension("previous");
    let had_previous = out_dir.exists();
    if had_previous {
        fs::rename(out_dir, &backup).with_context(|| {
            format!("moving previous export {} aside", out_dir.display())
        })?;
    }

    if let Err(e) = fs::rename(staging, out_dir) {
        if had_previous {
            if let Err(restore) = fs::rename(&backup, out_dir) {
                warn!(backup = %backup.display(), "cannot restore previous export: {}", restore);
            }
        }
        return Err(e).with_context(|| {
            format!("renaming {} -> {}", staging.display(), out_dir.display())
        });
    }

    if had_previous {
        if let Err(e) = fs::remove_dir_all(&backup) {
            warn!(backup = %backup.display(), "cannot remove previous export: {}", e);
        }
    }
    Ok(())
}

/// Write the bundle to the directory `out_dir`, replacing any previous
/// export there.
///
/// Every file is first written into a hidden staging directory next to
/// `out_dir`, which is renamed into place only once complete; a failure
/// part-way leaves the previous export in place.
#[tracing::instrument(level = "info", skip(bundle), fields(out = %out_dir.display()))]
pub fn write_bundle(bundle: &ReportBundle, out_dir: &Path) -> Result<PathBuf> {
    let parent = match out_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("creating output parent {}", parent.display()))?;
    let staging = tempfile::Builder::new()
        .prefix(".socialscope-")
        .tempdir_in(&parent)
        .with_context(|| format!("creating staging directory in {}", parent.display()))?;

    // 1) one parquet file per sheet
    let mut manifest_sheets = Vec::with_capacity(bundle.sheets.len());
    for (i, sheet) in bundle.sheets.iter().enumerate() {
        let file = file_name_for(i, &sheet.name);
        write_parquet(&sheet.table, &staging.path().join(&file))?;
        debug!(sheet = %sheet.name, file = %file, rows = sheet.table.row_count(), "wrote sheet");
        manifest_sheets.push(ManifestSheet {
            name: sheet.name.clone(),
            file,
            rows: sheet.table.row_count(),
            columns: sheet
                .table
                .column_names()
                .into_iter()
                .map(String::from)
                .collect(),
        });
    }

    // 2) summary + manifest
    write_parquet(&bundle.summary, &staging.path().join(SUMMARY_FILE))?;
    let manifest = Manifest {
        generated_at: Utc::now(),
        sheets: manifest_sheets,
        summary: SUMMARY_FILE,
    };
    let manifest_path = staging.path().join(MANIFEST_FILE);
    let mut f = File::create(&manifest_path)
        .with_context(|| format!("creating {}", manifest_path.display()))?;
    serde_json::to_writer_pretty(&mut f, &manifest).context("serializing manifest")?;
    f.write_all(b"\n")?;
    drop(f);

    // 3) swap into place
    swap_into_place(staging.path(), out_dir)?;

    info!(sheets = bundle.sheets.len(), "export complete");
    Ok(out_dir.to_path_buf())
}
