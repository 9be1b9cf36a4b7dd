// src/pipeline/mod.rs

//! One pass: load every source, run each analysis behind its own failure
//! boundary, then export once from the finished in-memory result.

pub mod fanpage;
pub mod fastmoss;
pub mod influencers;
pub mod tiktok;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::analysis::AnalysisResult;
use crate::config::{Config, SourceConfig};
use crate::load::{self, SourceRef};
use crate::metrics::{self, NumericKind};
use crate::normalize::{DateHint, Normalizer};
use crate::report;
use crate::schema::{aliases, resolve_column, resolve_sheet, ColumnSpec};
use crate::table::Table;

/// Knobs shared by every analysis step.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub normalizer: Normalizer,
    pub top_n: usize,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            normalizer: config.normalizer(),
            top_n: config.top_n,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            normalizer: Normalizer::default(),
            top_n: metrics::TOP_N,
        }
    }
}

/// Every table a run can work with; `None` marks an unavailable source.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub tiktok: Option<Table>,
    pub influencers: Option<Table>,
    pub video: Option<Table>,
    pub livestream: Option<Table>,
    pub products: Option<Table>,
    pub fanpage: Option<Table>,
}

/// Run `step`; on error, log it and mark each of `keys` unavailable with the
/// error as reason. Failures never travel past this boundary.
pub fn run_step<F>(result: AnalysisResult, step: &str, keys: &[&str], f: F) -> AnalysisResult
where
    F: FnOnce() -> Result<AnalysisResult>,
{
    match f() {
        Ok(fragment) => result.merge(fragment),
        Err(e) => {
            let reason = format!("{:#}", e);
            warn!(step, %reason, "analysis skipped");
            keys.iter()
                .fold(result, |acc, key| acc.unavailable(*key, reason.clone()))
        }
    }
}

/// Mark all of a source's metrics unavailable.
pub fn source_unavailable(result: AnalysisResult, source: &str, keys: &[&str]) -> AnalysisResult {
    warn!(source, "source unavailable, skipping its analyses");
    let reason = format!("source unavailable: {}", source);
    keys.iter()
        .fold(result, |acc, key| acc.unavailable(*key, reason.clone()))
}

/// Resolved header for `spec`, or an error naming what was tried.
pub fn require<'t>(table: &'t Table, spec: &ColumnSpec) -> Result<&'t str> {
    resolve_column(table, spec).ok_or_else(|| {
        anyhow!(
            "column unresolved: no `{}` column in `{}` (accepted: {})",
            spec.canonical,
            table.name(),
            spec.aliases.join(", ")
        )
    })
}

/// Normalize the column resolved by `spec` in place and return its name.
pub fn numeric_column(
    table: Table,
    spec: &ColumnSpec,
    kind: NumericKind,
    settings: &Settings,
) -> Result<(Table, String)> {
    let name = require(&table, spec)?.to_string();
    let table = metrics::normalize_numeric(table, &name, &name, kind, &settings.normalizer)?;
    Ok((table, name))
}

/// Normalize every column in `specs` that the table has; unresolved ones are
/// skipped. Returns the names that were normalized, in `specs` order.
pub fn numeric_columns(
    mut table: Table,
    specs: &[ColumnSpec],
    settings: &Settings,
) -> Result<(Table, Vec<String>)> {
    let mut names = Vec::new();
    for spec in specs {
        if resolve_column(&table, spec).is_some() {
            let (t, name) = numeric_column(table, spec, NumericKind::Count, settings)?;
            table = t;
            names.push(name);
        }
    }
    Ok((table, names))
}

/// Parse the column resolved by `spec` into timestamps and return its name.
pub fn datetime_column(table: Table, spec: &ColumnSpec, hint: DateHint) -> Result<(Table, String)> {
    let name = require(&table, spec)?.to_string();
    let table = metrics::parse_datetime_column(table, &name, hint)?;
    Ok((table, name))
}

fn load_configured(source: Option<&SourceConfig>, data_dir: &Path) -> Result<Option<Table>> {
    match source {
        Some(cfg) => load::load(&cfg.source_ref(data_dir)),
        None => Ok(None),
    }
}

/// Load every configured source. Only errors unrelated to a single source
/// (see [`load::load`]) propagate.
pub fn load_inputs(config: &Config) -> Result<Inputs> {
    let data_dir = &config.data_dir;
    let mut inputs = Inputs {
        tiktok: load_configured(config.sources.tiktok.as_ref(), data_dir)?,
        ..Inputs::default()
    };

    if let Some(cfg) = &config.sources.fanpage {
        let mut source = cfg.source_ref(data_dir);
        if source.sheet.is_none() {
            let sheets = load::sheet_names(&source.path);
            source.sheet = resolve_sheet(&sheets, aliases::fanpage::SHEETS).map(String::from);
        }
        inputs.fanpage = load::load(&source)?;
    }

    if let Some(cfg) = &config.sources.fastmoss {
        load_fastmoss(&cfg.source_ref(data_dir), &mut inputs)?;
    }

    Ok(inputs)
}

/// Which input a FastMoss sheet feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShopSheet {
    Video,
    Livestream,
    Products,
    Influencers,
}

impl ShopSheet {
    /// Classify a configured sheet name by the shop-sheet aliases; anything
    /// else is taken as an influencer list.
    fn of(sheet: &str) -> Self {
        use crate::schema::aliases::fastmoss::{LIVESTREAM_SHEETS, PRODUCT_SHEETS, VIDEO_SHEETS};

        let name = [sheet.to_string()];
        if resolve_sheet(&name, VIDEO_SHEETS).is_some() {
            ShopSheet::Video
        } else if resolve_sheet(&name, LIVESTREAM_SHEETS).is_some() {
            ShopSheet::Livestream
        } else if resolve_sheet(&name, PRODUCT_SHEETS).is_some() {
            ShopSheet::Products
        } else {
            ShopSheet::Influencers
        }
    }

    fn slot(self, inputs: &mut Inputs) -> &mut Option<Table> {
        match self {
            ShopSheet::Video => &mut inputs.video,
            ShopSheet::Livestream => &mut inputs.livestream,
            ShopSheet::Products => &mut inputs.products,
            ShopSheet::Influencers => &mut inputs.influencers,
        }
    }
}

/// The shop workbook carries video / livestream / product sheets; a workbook
/// with none of the first two is an influencer list. A configured sheet is
/// loaded alone, into whichever input its name matches.
fn load_fastmoss(base: &SourceRef, inputs: &mut Inputs) -> Result<()> {
    use crate::schema::aliases::fastmoss::{LIVESTREAM_SHEETS, PRODUCT_SHEETS, VIDEO_SHEETS};

    if let Some(sheet) = &base.sheet {
        let kind = ShopSheet::of(sheet);
        info!(sheet = %sheet, ?kind, "configured FastMoss sheet");
        *kind.slot(inputs) = load::load(base)?;
        return Ok(());
    }

    let sheets = load::sheet_names(&base.path);
    info!(path = %base.path.display(), ?sheets, "FastMoss sheets");
    let with_sheet = |name: &str| SourceRef {
        sheet: Some(name.to_string()),
        ..base.clone()
    };

    let video = resolve_sheet(&sheets, VIDEO_SHEETS);
    let live = resolve_sheet(&sheets, LIVESTREAM_SHEETS);
    if let Some(v) = video {
        inputs.video = load::load(&with_sheet(v))?;
    }
    if let Some(l) = live {
        inputs.livestream = load::load(&with_sheet(l))?;
    }
    match resolve_sheet(&sheets, PRODUCT_SHEETS) {
        Some(p) => {
            info!(sheet = p, "found product data");
            inputs.products = load::load(&with_sheet(p))?;
        }
        None => warn!("product data sheet not found, continuing without product analysis"),
    }

    if video.is_none() && live.is_none() {
        inputs.influencers = load::load(base)?;
    }
    Ok(())
}

/// Run every analysis over `inputs`.
pub fn analyze(inputs: &Inputs, settings: &Settings) -> AnalysisResult {
    let result = AnalysisResult::new();
    let result = fanpage::analyze(result, inputs.fanpage.as_ref(), settings);
    let result = tiktok::analyze(result, inputs.tiktok.as_ref(), settings);
    let result = influencers::analyze(result, inputs.influencers.as_ref(), settings);
    fastmoss::analyze(
        result,
        inputs.video.as_ref(),
        inputs.livestream.as_ref(),
        inputs.products.as_ref(),
        settings,
    )
}

/// Load and analyze.
#[tracing::instrument(level = "info", skip(config), fields(data_dir = %config.data_dir.display()))]
pub fn run(config: &Config) -> Result<AnalysisResult> {
    let start = Instant::now();
    let inputs = load_inputs(config)?;
    let result = analyze(&inputs, &Settings::from_config(config));
    let unavailable = result.iter().filter(|(_, m)| !m.is_available()).count();
    info!(
        metrics = result.len(),
        unavailable,
        elapsed = ?start.elapsed(),
        "analysis complete"
    );
    Ok(result)
}

/// Load, analyze, and write the workbook. Returns the output directory.
pub fn run_and_export(config: &Config) -> Result<PathBuf> {
    let result = run(config)?;
    let bundle = report::assemble(&result)?;
    report::write_bundle(&bundle, &config.output_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Metric;
    use crate::config::Sources;
    use crate::normalize::ParseFailure;
    use crate::table::{Column, Value};
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,socialscope=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    #[test]
    fn step_errors_become_unavailable_entries() {
        let result = AnalysisResult::new().with_number("kept", 1.0);
        let result = run_step(result, "broken", &["a", "b"], || Err(anyhow!("boom")));
        let result = run_step(result, "fine", &["c"], || {
            Ok(AnalysisResult::new().with_number("c", 3.0))
        });

        assert_eq!(result.get("kept"), Some(&Metric::Number(1.0)));
        assert_eq!(result.get("a"), Some(&Metric::Unavailable("boom".into())));
        assert!(!result.is_available("b"));
        assert_eq!(result.get("c"), Some(&Metric::Number(3.0)));
    }

    #[test]
    fn missing_column_only_skips_dependent_metrics() {
        init_test_logging();
        // three rows, no view-count column
        let table = Table::new(
            "apify",
            vec![
                Column::new(
                    "createTimeISO",
                    vec![
                        "2024-05-01T10:00:00.000Z".into(),
                        "2024-05-01T21:30:00.000Z".into(),
                        "2024-05-02T10:15:00.000Z".into(),
                    ],
                ),
                Column::new(
                    "text",
                    vec!["#sale hi".into(), "#Sale #new".into(), "plain".into()],
                ),
                Column::new("diggCount", vec!["1,2k".into(), Value::Number(3.0), "5".into()]),
            ],
        )
        .unwrap();
        let inputs = Inputs {
            tiktok: Some(table),
            ..Inputs::default()
        };

        let result = analyze(&inputs, &Settings::default());

        assert_eq!(result.get(tiktok::POST_COUNT), Some(&Metric::Number(3.0)));
        assert_eq!(result.get(tiktok::PEAK_HOUR), Some(&Metric::Number(10.0)));
        assert_eq!(result.get(tiktok::TOP_HASHTAG), Some(&Metric::Text("sale".into())));
        assert!(result.is_available(tiktok::POSTS_BY_WEEKDAY));

        match result.get(tiktok::TOP_VIDEOS) {
            Some(Metric::Unavailable(reason)) => assert!(reason.contains("views"), "{}", reason),
            other => panic!("expected unavailable top videos, got {:?}", other),
        }
        // weekly sums still come from the like counts, without rates
        let Some(Metric::Table(weeks)) = result.get(tiktok::WEEKLY) else {
            panic!("weekly missing: {:?}", result.get(tiktok::WEEKLY));
        };
        assert_eq!(weeks.column_names(), vec!["week", "diggCount"]);
        assert_eq!(weeks.cell(0, "diggCount"), Some(&Value::Number(1208.0)));

        // sources that were never loaded
        assert!(!result.is_available(fanpage::TOP_INTERACTION));
        assert!(!result.is_available(fastmoss::VIDEO_WEEKLY));
    }

    #[test]
    fn strict_policy_skips_metric_with_bad_cell() {
        let table = Table::new(
            "koc",
            vec![
                Column::new("Lượt xem", vec!["2tr".into(), "??".into()]),
                Column::new("Phân loại KOC/KOL", vec!["Nano".into(), "Micro".into()]),
            ],
        )
        .unwrap();
        let inputs = Inputs {
            influencers: Some(table),
            ..Inputs::default()
        };
        let settings = Settings {
            normalizer: Normalizer::new(ParseFailure::Strict),
            ..Settings::default()
        };

        let result = analyze(&inputs, &settings);
        assert_eq!(result.get(influencers::COUNT), Some(&Metric::Number(2.0)));
        match result.get(influencers::TOTAL_VIEWS) {
            Some(Metric::Unavailable(reason)) => assert!(reason.contains("??"), "{}", reason),
            other => panic!("expected unavailable total views, got {:?}", other),
        }
    }

    #[test]
    fn end_to_end_from_csv_exports() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        fs::write(
            dir.path().join("[APIFY] Cỏ Mềm.csv"),
            "createTime,desc,playCount,diggCount,shareCount,commentCount\n\
             1714557600,#CoMem mới,1.000,100,10,5\n\
             1714644000,#comem #sale,\"2,5k\",50,0,0\n\
             1715162400,no tags,0,0,0,0\n",
        )?;
        fs::write(
            dir.path().join("[FASTMOSS] Cỏ Mềm.csv"),
            "Tên,Lượt xem,[90 ngày gần đây]Lượt thích,Thời gian đăng,Phân loại KOC/KOL\n\
             A,2tr,\"1,5k\",Đăng 2024-05-01 10:00:00 tại HN,Mega\n\
             B,500k,5k,2024-05-02 20:00:00,Micro\n\
             C,0,0,n/a,Micro\n",
        )?;
        fs::write(
            dir.path().join("[FANPAGE KARMA] Cỏ Mềm.csv"),
            "Fanpage Karma export,,\n\
             Profile,Date,Post interaction rate\n\
             Shop A,2024-05-01,0.8\n\
             Shop B,2024-05-01,1.6\n",
        )?;

        let mut config = Config::discover(dir.path())?;
        assert_eq!(config.brand.as_deref(), Some("Cỏ Mềm"));
        config.output = Some(dir.path().join("out"));

        let result = run(&config)?;
        assert_eq!(result.get(tiktok::POST_COUNT), Some(&Metric::Number(3.0)));
        assert_eq!(result.get(tiktok::TOP_HASHTAG), Some(&Metric::Text("comem".into())));
        match result.get(tiktok::WEEKLY) {
            Some(Metric::Table(weekly)) => {
                assert_eq!(weekly.row_count(), 2);
                assert_eq!(weekly.cell(0, "playCount"), Some(&Value::Number(3500.0)));
                assert_eq!(weekly.cell(0, "like_rate_pct"), Some(&Value::Number(150.0 / 3500.0 * 100.0)));
            }
            other => panic!("expected weekly table, got {:?}", other),
        }

        assert_eq!(result.get(influencers::TOTAL_VIEWS), Some(&Metric::Number(2_500_000.0)));
        assert_eq!(result.get(influencers::BEST_CATEGORY), Some(&Metric::Text("Mega".into())));

        assert_eq!(
            result.get(fanpage::INTERACTION_RATE_MEAN),
            Some(&Metric::Number((0.8 + 1.6) / 2.0))
        );
        assert!(!result.is_available(fastmoss::VIDEO_WEEKLY));

        let out = run_and_export(&config)?;
        assert!(out.join(report::MANIFEST_FILE).exists());
        assert!(out.join(report::SUMMARY_FILE).exists());
        Ok(())
    }

    #[test]
    fn missing_sources_are_reported_not_raised() -> Result<()> {
        let dir = tempdir()?;
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            sources: Sources {
                tiktok: Some(SourceConfig::new("[APIFY] gone.xlsx")),
                fastmoss: Some(SourceConfig::new("[FASTMOSS] gone.xlsx")),
                fanpage: None,
            },
            ..Config::default()
        };
        let result = run(&config)?;
        assert!(result.iter().all(|(_, m)| !m.is_available()));
        assert!(result.get(tiktok::WEEKLY).is_some());
        Ok(())
    }

    #[test]
    fn configured_shop_sheet_is_routed_by_name() -> Result<()> {
        assert_eq!(ShopSheet::of("Data Video"), ShopSheet::Video);
        assert_eq!(ShopSheet::of("live"), ShopSheet::Livestream);
        assert_eq!(ShopSheet::of("Data Product"), ShopSheet::Products);
        assert_eq!(ShopSheet::of("KOC list"), ShopSheet::Influencers);

        let dir = tempdir()?;
        let path = dir.path().join("[FASTMOSS] shop.csv");
        fs::write(&path, "Thời gian phát hành,Lượt xem\n2024-05-06 08:00:00,1000\n")?;

        let mut inputs = Inputs::default();
        load_fastmoss(&SourceRef::new(&path).with_sheet("Data Video"), &mut inputs)?;
        assert!(inputs.video.is_some());
        assert!(inputs.influencers.is_none());

        let result = analyze(&inputs, &Settings::default());
        assert!(result.is_available(fastmoss::VIDEO_WEEKLY));
        Ok(())
    }
}
