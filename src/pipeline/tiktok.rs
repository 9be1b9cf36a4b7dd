// src/pipeline/tiktok.rs
use anyhow::{bail, Result};

use super::{datetime_column, numeric_column, numeric_columns, require, run_step, source_unavailable, Settings};
use crate::analysis::AnalysisResult;
use crate::metrics::aggregate::{weekly, Ratio};
use crate::metrics::hashtags::hashtag_table;
use crate::metrics::rank::top_n;
use crate::metrics::{temporal, NumericKind};
use crate::normalize::DateHint;
use crate::schema::aliases::tiktok::{
    COMMENTS, LIKES, SHARES, TEXT, TIMESTAMP_EPOCH, TIMESTAMP_ISO, VIEWS,
};
use crate::schema::resolve_column;
use crate::table::{Table, Value};

pub const POST_COUNT: &str = "tiktok_post_count";
pub const DATE_RANGE: &str = "tiktok_date_range";
pub const POSTS_BY_HOUR: &str = "tiktok_posts_by_hour";
pub const PEAK_HOUR: &str = "tiktok_peak_hour";
pub const POSTS_BY_WEEKDAY: &str = "tiktok_posts_by_weekday";
pub const TOP_HASHTAGS: &str = "tiktok_top_hashtags";
pub const TOP_HASHTAG: &str = "tiktok_top_hashtag";
pub const TOP_VIDEOS: &str = "tiktok_top_videos";
pub const WEEKLY: &str = "tiktok_weekly";

pub const KEYS: &[&str] = &[
    POST_COUNT,
    DATE_RANGE,
    POSTS_BY_HOUR,
    PEAK_HOUR,
    POSTS_BY_WEEKDAY,
    TOP_HASHTAGS,
    TOP_HASHTAG,
    TOP_VIDEOS,
    WEEKLY,
];

pub const LIKE_RATE: &str = "like_rate_pct";
pub const ENGAGEMENT_RATE: &str = "engagement_rate_pct";

/// Parse the post timestamp: ISO text when present, epoch seconds otherwise.
fn with_timestamps(table: &Table) -> Result<(Table, String)> {
    if resolve_column(table, &TIMESTAMP_ISO).is_some() {
        datetime_column(table.clone(), &TIMESTAMP_ISO, DateHint::Auto)
    } else {
        datetime_column(table.clone(), &TIMESTAMP_EPOCH, DateHint::EpochSeconds)
    }
}

fn posting_time(table: &Table) -> Result<AnalysisResult> {
    let (table, ts) = with_timestamps(table)?;
    let Some((first, last)) = temporal::date_range(&table, &ts)? else {
        bail!("no parseable timestamps in `{}`", ts);
    };

    let by_hour = temporal::posts_by_hour(&table, &ts)?;
    let result = AnalysisResult::new().with_text(
        DATE_RANGE,
        format!("{} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d")),
    );
    let result = match temporal::peak_hour(&by_hour) {
        Some(hour) => result.with_number(PEAK_HOUR, f64::from(hour)),
        None => result.unavailable(PEAK_HOUR, "no posts with a timestamp"),
    };
    Ok(result
        .with_table(POSTS_BY_HOUR, by_hour)
        .with_table(POSTS_BY_WEEKDAY, temporal::posts_by_weekday(&table, &ts)?))
}

fn hashtags(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let text = require(table, &TEXT)?;
    let tags = hashtag_table(table, text, settings.top_n)?;
    let result = match tags.cell(0, "hashtag").and_then(Value::as_str) {
        Some(top) => AnalysisResult::new().with_text(TOP_HASHTAG, top),
        None => AnalysisResult::new().unavailable(TOP_HASHTAG, "no hashtags found"),
    };
    Ok(result.with_table(TOP_HASHTAGS, tags))
}

fn top_videos(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let (table, views) = numeric_column(table.clone(), &VIEWS, NumericKind::Count, settings)?;
    let (table, counts) = numeric_columns(table, &[LIKES, SHARES, COMMENTS], settings)?;

    let mut keep: Vec<&str> = resolve_column(&table, &TEXT).into_iter().collect();
    keep.push(&views);
    keep.extend(counts.iter().map(String::as_str));

    let ranked = top_n(&table, &views, settings.top_n)?.select(&keep);
    Ok(AnalysisResult::new().with_table(TOP_VIDEOS, ranked.renamed(TOP_VIDEOS)))
}

/// Weekly sums of whichever view and interaction counts the scrape has.
/// Rates need views and are left out without them.
fn weekly_engagement(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let (table, ts) = with_timestamps(table)?;
    let (table, views) = numeric_columns(table, &[VIEWS], settings)?;
    let (table, interactions) = numeric_columns(table, &[LIKES, SHARES, COMMENTS], settings)?;
    if views.is_empty() && interactions.is_empty() {
        bail!(
            "column unresolved: no views, likes, shares or comments column in `{}`",
            table.name()
        );
    }

    let sums: Vec<&str> = views.iter().chain(&interactions).map(String::as_str).collect();
    let mut ratios = Vec::new();
    if let Some(views) = views.first() {
        if let Some(likes) = resolve_column(&table, &LIKES) {
            ratios.push(Ratio::new(LIKE_RATE, &[likes], views));
        }
        if !interactions.is_empty() {
            let numerators: Vec<&str> = interactions.iter().map(String::as_str).collect();
            ratios.push(Ratio::new(ENGAGEMENT_RATE, &numerators, views));
        }
    }

    let weeks = weekly(&table, &ts, &sums, &ratios)?;
    Ok(AnalysisResult::new().with_table(WEEKLY, weeks))
}

/// TikTok post analysis over an Apify scrape.
pub fn analyze(result: AnalysisResult, table: Option<&Table>, settings: &Settings) -> AnalysisResult {
    let Some(table) = table else {
        return source_unavailable(result, "TikTok export", KEYS);
    };

    let result = result.with_number(POST_COUNT, table.row_count() as f64);
    let result = run_step(
        result,
        "tiktok posting time",
        &[DATE_RANGE, POSTS_BY_HOUR, PEAK_HOUR, POSTS_BY_WEEKDAY],
        || posting_time(table),
    );
    let result = run_step(
        result,
        "tiktok hashtags",
        &[TOP_HASHTAGS, TOP_HASHTAG],
        || hashtags(table, settings),
    );
    let result = run_step(result, "tiktok top videos", &[TOP_VIDEOS], || {
        top_videos(table, settings)
    });
    run_step(result, "tiktok weekly", &[WEEKLY], || {
        weekly_engagement(table, settings)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Metric;
    use crate::table::Column;

    fn scrape() -> Table {
        Table::new(
            "apify",
            vec![
                Column::new(
                    "createTime",
                    vec![
                        Value::Number(1714557600.0),
                        Value::Number(1714644000.0),
                        "junk".into(),
                    ],
                ),
                Column::new("text", vec!["a #x".into(), "b #y #x".into(), "c".into()]),
                Column::new("playCount", vec!["1k".into(), "3k".into(), "9k".into()]),
                Column::new("diggCount", vec![Value::Number(10.0), Value::Number(30.0), Value::Empty]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn epoch_timestamps_feed_time_metrics() {
        let result = analyze(AnalysisResult::new(), Some(&scrape()), &Settings::default());
        assert_eq!(
            result.get(DATE_RANGE),
            Some(&Metric::Text("2024-05-01 to 2024-05-02".into()))
        );
        assert_eq!(result.get(PEAK_HOUR), Some(&Metric::Number(10.0)));
        assert_eq!(result.get(TOP_HASHTAG), Some(&Metric::Text("x".into())));
    }

    #[test]
    fn top_videos_are_ranked_by_views() {
        let result = analyze(AnalysisResult::new(), Some(&scrape()), &Settings::default());
        let Some(Metric::Table(top)) = result.get(TOP_VIDEOS) else {
            panic!("top videos missing");
        };
        assert_eq!(top.column_names(), vec!["text", "playCount", "diggCount"]);
        assert_eq!(top.cell(0, "text"), Some(&Value::Text("c".into())));
        assert_eq!(top.cell(0, "playCount"), Some(&Value::Number(9000.0)));
    }

    #[test]
    fn weekly_rates_come_from_sums() {
        let result = analyze(AnalysisResult::new(), Some(&scrape()), &Settings::default());
        let Some(Metric::Table(weeks)) = result.get(WEEKLY) else {
            panic!("weekly missing");
        };
        // the third row has no timestamp and is left out
        assert_eq!(weeks.row_count(), 1);
        assert_eq!(weeks.cell(0, "playCount"), Some(&Value::Number(4000.0)));
        assert_eq!(weeks.cell(0, LIKE_RATE), Some(&Value::Number(1.0)));
        assert_eq!(weeks.cell(0, ENGAGEMENT_RATE), Some(&Value::Number(1.0)));
    }

    #[test]
    fn weekly_sums_without_views_have_no_rates() {
        let table = scrape().select(&["createTime", "diggCount"]);
        let result = analyze(AnalysisResult::new(), Some(&table), &Settings::default());
        let Some(Metric::Table(weeks)) = result.get(WEEKLY) else {
            panic!("weekly missing: {:?}", result.get(WEEKLY));
        };
        assert_eq!(weeks.column_names(), vec!["week", "diggCount"]);
        assert_eq!(weeks.cell(0, "diggCount"), Some(&Value::Number(40.0)));
        assert!(!result.is_available(TOP_VIDEOS));
    }

    #[test]
    fn weekly_needs_some_count_column() {
        let table = scrape().select(&["createTime", "text"]);
        let result = analyze(AnalysisResult::new(), Some(&table), &Settings::default());
        match result.get(WEEKLY) {
            Some(Metric::Unavailable(reason)) => assert!(reason.contains("column unresolved"), "{}", reason),
            other => panic!("expected unavailable weekly, got {:?}", other),
        }
    }

    #[test]
    fn absent_source_marks_every_key() {
        let result = analyze(AnalysisResult::new(), None, &Settings::default());
        assert_eq!(result.len(), KEYS.len());
        assert!(KEYS.iter().all(|k| !result.is_available(k)));
    }
}
