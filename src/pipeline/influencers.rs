// src/pipeline/influencers.rs
use anyhow::{anyhow, Result};

use super::{datetime_column, numeric_column, numeric_columns, require, run_step, source_unavailable, Settings};
use crate::analysis::AnalysisResult;
use crate::metrics::aggregate::category_means;
use crate::metrics::engagement::with_engagement_rate;
use crate::metrics::{self, temporal, NumericKind};
use crate::normalize::DateHint;
use crate::schema::aliases::influencers::{CATEGORY, FOLLOWERS, LIKES, POSTED_AT, VIEWS};
use crate::schema::resolve_column;
use crate::table::{Table, Value};

pub const COUNT: &str = "koc_count";
pub const TOTAL_VIEWS: &str = "koc_total_views";
pub const INFLUENCERS: &str = "koc_influencers";
pub const ENGAGEMENT_RATE_MEAN: &str = "koc_engagement_rate_mean";
pub const POSTS_BY_HOUR: &str = "koc_posts_by_hour";
pub const CATEGORY_AVG_VIEWS: &str = "koc_category_avg_views";
pub const BEST_CATEGORY: &str = "koc_best_category";

pub const KEYS: &[&str] = &[
    COUNT,
    TOTAL_VIEWS,
    INFLUENCERS,
    ENGAGEMENT_RATE_MEAN,
    POSTS_BY_HOUR,
    CATEGORY_AVG_VIEWS,
    BEST_CATEGORY,
];

pub const ENGAGEMENT_RATE: &str = "engagement_rate_pct";

/// The influencer list with counts normalized, posting time split out and a
/// per-row engagement rate where both operands exist.
fn prepared(table: &Table, settings: &Settings) -> Result<Table> {
    let (mut table, _) = numeric_columns(table.clone(), &[VIEWS, LIKES, FOLLOWERS], settings)?;

    if resolve_column(&table, &POSTED_AT).is_some() {
        let (t, posted) = datetime_column(table, &POSTED_AT, DateHint::Auto)?;
        table = temporal::derive_temporal(t, &posted)?;
    }

    let operands = resolve_column(&table, &LIKES)
        .zip(resolve_column(&table, &VIEWS))
        .map(|(l, v)| (l.to_string(), v.to_string()));
    match operands {
        Some((likes, views)) => with_engagement_rate(table, &likes, &views, ENGAGEMENT_RATE),
        None => Ok(table),
    }
}

fn influencer_table(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let table = prepared(table, settings)?;
    let result = match metrics::mean(&table, ENGAGEMENT_RATE) {
        Ok(Some(mean)) => AnalysisResult::new().with_number(ENGAGEMENT_RATE_MEAN, mean),
        Ok(None) => AnalysisResult::new().unavailable(ENGAGEMENT_RATE_MEAN, "no rows with both likes and views"),
        Err(_) => AnalysisResult::new().unavailable(
            ENGAGEMENT_RATE_MEAN,
            format!(
                "column unresolved: needs both `{}` and `{}`",
                LIKES.canonical, VIEWS.canonical
            ),
        ),
    };
    Ok(result.with_table(INFLUENCERS, table.renamed(INFLUENCERS)))
}

fn total_views(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let (table, views) = numeric_column(table.clone(), &VIEWS, NumericKind::Count, settings)?;
    Ok(AnalysisResult::new().with_number(TOTAL_VIEWS, metrics::sum(&table, &views)?))
}

fn posting_hours(table: &Table) -> Result<AnalysisResult> {
    let (table, posted) = datetime_column(table.clone(), &POSTED_AT, DateHint::Auto)?;
    Ok(AnalysisResult::new().with_table(POSTS_BY_HOUR, temporal::posts_by_hour(&table, &posted)?))
}

fn categories(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let category = require(table, &CATEGORY)?.to_string();
    let (table, views) = numeric_column(table.clone(), &VIEWS, NumericKind::Count, settings)?;
    let means = category_means(&table, &category, &views, settings.top_n)?;
    let best = means
        .cell(0, &category)
        .map(Value::to_string)
        .ok_or_else(|| anyhow!("no categorized rows with views"))?;
    Ok(AnalysisResult::new()
        .with_table(CATEGORY_AVG_VIEWS, means)
        .with_text(BEST_CATEGORY, best))
}

/// KOC/KOL analysis over a FastMoss influencer list.
pub fn analyze(result: AnalysisResult, table: Option<&Table>, settings: &Settings) -> AnalysisResult {
    let Some(table) = table else {
        return source_unavailable(result, "FastMoss influencer list", KEYS);
    };

    let result = result.with_number(COUNT, table.row_count() as f64);
    let result = run_step(result, "koc total views", &[TOTAL_VIEWS], || {
        total_views(table, settings)
    });
    let result = run_step(
        result,
        "koc influencer table",
        &[INFLUENCERS, ENGAGEMENT_RATE_MEAN],
        || influencer_table(table, settings),
    );
    let result = run_step(result, "koc posting hours", &[POSTS_BY_HOUR], || {
        posting_hours(table)
    });
    run_step(
        result,
        "koc categories",
        &[CATEGORY_AVG_VIEWS, BEST_CATEGORY],
        || categories(table, settings),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Metric;
    use crate::normalize::{Normalizer, ParseFailure};
    use crate::table::Column;

    fn list() -> Table {
        Table::new(
            "koc",
            vec![
                Column::new("Lượt xem", vec!["1tr".into(), "200k".into(), "bad".into()]),
                Column::new(
                    "[90 ngày gần đây]Lượt thích",
                    vec!["50k".into(), "2k".into(), "7".into()],
                ),
                Column::new(
                    "Thời gian đăng",
                    vec![
                        "2024-05-01 09:15:00".into(),
                        "đăng lúc 2024-05-03 09:40:00".into(),
                        Value::Empty,
                    ],
                ),
                Column::new(
                    "Phân loại KOC/KOL",
                    vec!["Micro".into(), "Nano".into(), "Nano".into()],
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rates_and_categories() {
        let result = analyze(AnalysisResult::new(), Some(&list()), &Settings::default());
        assert_eq!(result.get(COUNT), Some(&Metric::Number(3.0)));
        assert_eq!(result.get(TOTAL_VIEWS), Some(&Metric::Number(1_200_000.0)));
        // "bad" views read as 0, whose rate is guarded to 0
        assert_eq!(
            result.get(ENGAGEMENT_RATE_MEAN),
            Some(&Metric::Number((5.0 + 1.0 + 0.0) / 3.0))
        );
        assert_eq!(result.get(BEST_CATEGORY), Some(&Metric::Text("Micro".into())));

        let Some(Metric::Table(hours)) = result.get(POSTS_BY_HOUR) else {
            panic!("posting hours missing");
        };
        assert_eq!(hours.cell(0, temporal::HOUR), Some(&Value::Number(9.0)));
        assert_eq!(hours.cell(0, "posts"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn excluded_cells_drop_out_of_means() {
        let settings = Settings {
            normalizer: Normalizer::new(ParseFailure::Exclude),
            ..Settings::default()
        };
        let result = analyze(AnalysisResult::new(), Some(&list()), &settings);
        assert_eq!(
            result.get(ENGAGEMENT_RATE_MEAN),
            Some(&Metric::Number((5.0 + 1.0) / 2.0))
        );
        let Some(Metric::Table(means)) = result.get(CATEGORY_AVG_VIEWS) else {
            panic!("category means missing");
        };
        assert_eq!(means.cell(1, "Lượt xem (mean)"), Some(&Value::Number(200_000.0)));
    }

    #[test]
    fn missing_category_only_skips_category_metrics() {
        let table = list().select(&["Lượt xem", "[90 ngày gần đây]Lượt thích"]);
        let result = analyze(AnalysisResult::new(), Some(&table), &Settings::default());
        assert!(result.is_available(TOTAL_VIEWS));
        assert!(result.is_available(ENGAGEMENT_RATE_MEAN));
        assert!(!result.is_available(CATEGORY_AVG_VIEWS));
        assert!(!result.is_available(BEST_CATEGORY));
        assert!(!result.is_available(POSTS_BY_HOUR));
    }
}
