// src/pipeline/fanpage.rs
use anyhow::{anyhow, Result};

use super::{datetime_column, numeric_column, run_step, source_unavailable, Settings};
use crate::analysis::AnalysisResult;
use crate::metrics::aggregate::{daily_sum, daily_table};
use crate::metrics::rank::top_n;
use crate::metrics::{self, NumericKind};
use crate::normalize::DateHint;
use crate::schema::aliases::fanpage::{DATE, ENGAGEMENT, INTERACTION_RATE};
use crate::table::Table;

pub const METRICS: &str = "fanpage_metrics";
pub const DAILY_ENGAGEMENT: &str = "fanpage_daily_engagement";
pub const TOP_INTERACTION: &str = "fanpage_top_interaction";
pub const INTERACTION_RATE_MEAN: &str = "fanpage_interaction_rate_mean";

pub const KEYS: &[&str] = &[METRICS, DAILY_ENGAGEMENT, TOP_INTERACTION, INTERACTION_RATE_MEAN];

fn daily_engagement(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let (table, date) = datetime_column(table.clone(), &DATE, DateHint::Auto)?;
    let (table, engagement) = numeric_column(table, &ENGAGEMENT, NumericKind::Count, settings)?;
    let daily = daily_table(&engagement, &daily_sum(&table, &date, &engagement)?)?;
    Ok(AnalysisResult::new().with_table(DAILY_ENGAGEMENT, daily))
}

/// Karma writes rates dot-decimal, unlike the Vietnamese-locale tools.
fn interaction(table: &Table, settings: &Settings) -> Result<AnalysisResult> {
    let (table, rate) = numeric_column(table.clone(), &INTERACTION_RATE, NumericKind::Plain, settings)?;
    let mean = metrics::mean(&table, &rate)?
        .ok_or_else(|| anyhow!("no numeric values in `{}`", rate))?;
    let top = top_n(&table, &rate, settings.top_n)?;
    Ok(AnalysisResult::new()
        .with_table(TOP_INTERACTION, top.renamed(TOP_INTERACTION))
        .with_number(INTERACTION_RATE_MEAN, mean))
}

/// Page-engagement analysis over a Fanpage Karma export.
pub fn analyze(result: AnalysisResult, table: Option<&Table>, settings: &Settings) -> AnalysisResult {
    let Some(table) = table else {
        return source_unavailable(result, "Fanpage Karma export", KEYS);
    };

    let result = result.with_table(METRICS, table.clone().renamed(METRICS));
    let result = run_step(result, "fanpage daily engagement", &[DAILY_ENGAGEMENT], || {
        daily_engagement(table, settings)
    });
    run_step(
        result,
        "fanpage interaction rate",
        &[TOP_INTERACTION, INTERACTION_RATE_MEAN],
        || interaction(table, settings),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Metric;
    use crate::load::{self, SourceRef};
    use crate::table::{Column, Value};

    fn overview() -> Table {
        Table::new(
            "karma/Metrics Overview",
            vec![
                Column::new("Profile", vec!["A".into(), "B".into(), "C".into()]),
                Column::new(
                    "Ngày",
                    vec!["01/05/2024 00:00".into(), "01/05/2024 12:30".into(), "02/05/2024 00:00".into()],
                ),
                Column::new("Total Engagement", vec!["1.200".into(), "300".into(), "1k".into()]),
                Column::new("Post interaction rate", vec!["0.5%".into(), "2.5%".into(), "1%".into()]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn engagement_per_day_and_top_pages() {
        let result = analyze(AnalysisResult::new(), Some(&overview()), &Settings::default());
        assert!(result.is_available(METRICS));

        let Some(Metric::Table(daily)) = result.get(DAILY_ENGAGEMENT) else {
            panic!("daily engagement missing");
        };
        assert_eq!(daily.row_count(), 2);
        assert_eq!(daily.cell(0, "date"), Some(&Value::from("2024-05-01")));
        assert_eq!(daily.cell(0, "Total Engagement"), Some(&Value::Number(1500.0)));

        let Some(Metric::Table(top)) = result.get(TOP_INTERACTION) else {
            panic!("top interaction missing");
        };
        assert_eq!(top.cell(0, "Profile"), Some(&Value::from("B")));
        assert_eq!(top.cell(2, "Profile"), Some(&Value::from("A")));
        assert_eq!(result.get(INTERACTION_RATE_MEAN), Some(&Metric::Number(4.0 / 3.0)));
    }

    #[test]
    fn csv_rates_are_read_dot_decimal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("[FANPAGE KARMA] Brand.csv");
        std::fs::write(
            &path,
            "Profile,Date,Post interaction rate\nA,2024-05-01,0.0123\nB,2024-05-02,0.5\n",
        )?;
        let table = load::load(&SourceRef::new(&path))?.expect("table");

        let result = analyze(AnalysisResult::new(), Some(&table), &Settings::default());
        let Some(Metric::Number(mean)) = result.get(INTERACTION_RATE_MEAN) else {
            panic!("mean missing: {:?}", result.get(INTERACTION_RATE_MEAN));
        };
        assert!((mean - 0.25615).abs() < 1e-12, "{}", mean);

        let Some(Metric::Table(top)) = result.get(TOP_INTERACTION) else {
            panic!("top interaction missing");
        };
        assert_eq!(top.cell(0, "Post interaction rate"), Some(&Value::Number(0.5)));
        Ok(())
    }

    #[test]
    fn missing_rate_column_keeps_the_rest() {
        let table = overview().select(&["Profile", "Ngày", "Total Engagement"]);
        let result = analyze(AnalysisResult::new(), Some(&table), &Settings::default());
        assert!(result.is_available(DAILY_ENGAGEMENT));
        assert!(!result.is_available(TOP_INTERACTION));
        assert!(!result.is_available(INTERACTION_RATE_MEAN));
    }
}
