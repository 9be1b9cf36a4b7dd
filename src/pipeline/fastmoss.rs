// src/pipeline/fastmoss.rs
use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::{datetime_column, numeric_column, require, run_step, source_unavailable, Settings};
use crate::analysis::AnalysisResult;
use crate::metrics::aggregate::{compare_daily, daily_sum, weekly, Ratio};
use crate::metrics::{self, NumericKind};
use crate::normalize::DateHint;
use crate::schema::aliases::fastmoss::{
    LIKES, LIVESTREAM_DATE, LIVESTREAM_REVENUE, PRODUCT_REVENUE, REVENUE_VND, VIDEO_DATE,
    VIDEO_REVENUE, VIEWS,
};
use crate::schema::{resolve_column, ColumnSpec};
use crate::table::Table;

pub const VIDEO_WEEKLY: &str = "video_weekly";
pub const VIDEO_REVENUE_TOTAL: &str = "video_revenue_total";
pub const LIVESTREAM_WEEKLY: &str = "livestream_weekly";
pub const LIVESTREAM_REVENUE_TOTAL: &str = "livestream_revenue_total";
pub const VIDEO_VS_LIVESTREAM: &str = "video_vs_livestream_daily";
pub const PRODUCTS: &str = "products";
pub const PRODUCT_REVENUE_TOTAL: &str = "product_revenue_total";

pub const VIDEO_KEYS: &[&str] = &[VIDEO_WEEKLY, VIDEO_REVENUE_TOTAL];
pub const LIVESTREAM_KEYS: &[&str] = &[LIVESTREAM_WEEKLY, LIVESTREAM_REVENUE_TOTAL];
pub const PRODUCT_KEYS: &[&str] = &[PRODUCTS, PRODUCT_REVENUE_TOTAL];

pub const ENGAGEMENT_RATE: &str = "engagement_rate_pct";
pub const VIDEO_VIEWS: &str = "video_views";
pub const LIVESTREAM_VIEWS: &str = "livestream_views";

/// Column specs for one kind of shop sheet.
struct Channel {
    label: &'static str,
    date: ColumnSpec,
    revenue: ColumnSpec,
}

const VIDEO: Channel = Channel {
    label: "video",
    date: VIDEO_DATE,
    revenue: VIDEO_REVENUE,
};

const LIVESTREAM: Channel = Channel {
    label: "livestream",
    date: LIVESTREAM_DATE,
    revenue: LIVESTREAM_REVENUE,
};

/// Copy the revenue column into [`REVENUE_VND`] as VND amounts.
fn with_revenue(table: Table, spec: &ColumnSpec, settings: &Settings) -> Result<Table> {
    let raw = require(&table, spec)?.to_string();
    metrics::normalize_numeric(table, &raw, REVENUE_VND, NumericKind::Currency, &settings.normalizer)
}

/// Weekly sums of views, likes and revenue with the like rate taken from
/// the sums.
fn channel_weekly(table: &Table, channel: &Channel, settings: &Settings) -> Result<Table> {
    let (mut table, date) = datetime_column(table.clone(), &channel.date, DateHint::Auto)?;
    let mut sums: Vec<String> = Vec::new();
    for spec in [&VIEWS, &LIKES] {
        if resolve_column(&table, spec).is_some() {
            let (t, name) = numeric_column(table, spec, NumericKind::Count, settings)?;
            table = t;
            sums.push(name);
        }
    }
    if resolve_column(&table, &channel.revenue).is_some() {
        table = with_revenue(table, &channel.revenue, settings)?;
        sums.push(REVENUE_VND.to_string());
    }
    if sums.is_empty() {
        bail!(
            "column unresolved: no views, likes or revenue column in `{}`",
            table.name()
        );
    }

    let mut ratios = Vec::new();
    if let (Some(likes), Some(views)) = (resolve_column(&table, &LIKES), resolve_column(&table, &VIEWS)) {
        ratios.push(Ratio::new(ENGAGEMENT_RATE, &[likes], views));
    }
    let sums: Vec<&str> = sums.iter().map(String::as_str).collect();
    Ok(weekly(&table, &date, &sums, &ratios)?.renamed(format!("{}_weekly", channel.label)))
}

fn revenue_total(table: &Table, spec: &ColumnSpec, settings: &Settings) -> Result<f64> {
    let table = with_revenue(table.clone(), spec, settings)?;
    metrics::sum(&table, REVENUE_VND)
}

fn daily_views(table: &Table, channel: &Channel, settings: &Settings) -> Result<BTreeMap<NaiveDate, f64>> {
    let (table, date) = datetime_column(table.clone(), &channel.date, DateHint::Auto)?;
    let (table, views) = numeric_column(table, &VIEWS, NumericKind::Count, settings)?;
    daily_sum(&table, &date, &views)
}

fn analyze_channel(
    result: AnalysisResult,
    table: Option<&Table>,
    channel: &Channel,
    keys: &[&str],
    settings: &Settings,
) -> AnalysisResult {
    let Some(table) = table else {
        return source_unavailable(result, &format!("FastMoss {} sheet", channel.label), keys);
    };
    let (weekly_key, revenue_key) = (keys[0], keys[1]);
    let result = run_step(result, &format!("{} weekly", channel.label), &[weekly_key], || {
        Ok(AnalysisResult::new().with_table(weekly_key, channel_weekly(table, channel, settings)?))
    });
    run_step(result, &format!("{} revenue", channel.label), &[revenue_key], || {
        Ok(AnalysisResult::new().with_number(revenue_key, revenue_total(table, &channel.revenue, settings)?))
    })
}

fn products(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let result = AnalysisResult::new();
    if resolve_column(table, &PRODUCT_REVENUE).is_none() {
        let reason = format!(
            "column unresolved: no `{}` column in `{}`",
            PRODUCT_REVENUE.canonical,
            table.name()
        );
        return Ok(result
            .with_table(PRODUCTS, table.clone().renamed(PRODUCTS))
            .unavailable(PRODUCT_REVENUE_TOTAL, reason));
    }
    let table = with_revenue(table.clone(), &PRODUCT_REVENUE, settings)?;
    Ok(result
        .with_table(PRODUCTS, table.clone().renamed(PRODUCTS))
        .with_number(PRODUCT_REVENUE_TOTAL, metrics::sum(&table, REVENUE_VND)?))
}

/// Shop analysis over the FastMoss video, livestream and product sheets.
pub fn analyze(
    result: AnalysisResult,
    video: Option<&Table>,
    livestream: Option<&Table>,
    product: Option<&Table>,
    settings: &Settings,
) -> AnalysisResult {
    let result = analyze_channel(result, video, &VIDEO, VIDEO_KEYS, settings);
    let result = analyze_channel(result, livestream, &LIVESTREAM, LIVESTREAM_KEYS, settings);

    let result = match (video, livestream) {
        (Some(v), Some(l)) => run_step(result, "video vs livestream", &[VIDEO_VS_LIVESTREAM], || {
            let video = daily_views(v, &VIDEO, settings)?;
            let live = daily_views(l, &LIVESTREAM, settings)?;
            let table = compare_daily(VIDEO_VIEWS, &video, LIVESTREAM_VIEWS, &live)?;
            Ok(AnalysisResult::new().with_table(VIDEO_VS_LIVESTREAM, table))
        }),
        _ => result.unavailable(VIDEO_VS_LIVESTREAM, "needs both video and livestream sheets"),
    };

    match product {
        Some(p) => run_step(result, "products", PRODUCT_KEYS, || products(p, settings)),
        None => source_unavailable(result, "FastMoss product sheet", PRODUCT_KEYS),
    }
}
