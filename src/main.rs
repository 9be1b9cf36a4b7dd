use anyhow::Result;
use socialscope::{analysis::Metric, config::Config, pipeline};
use std::{env, path::PathBuf, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,socialscope=info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) resolve config: a YAML file, or a directory of exports ──
    let target = env::args().nth(1).map_or_else(|| PathBuf::from("."), PathBuf::from);
    let config = if target.is_dir() {
        Config::discover(&target)?
    } else {
        Config::from_yaml_file(&target)?
    };
    info!(
        brand = ?config.brand,
        on_parse_failure = ?config.on_parse_failure,
        "config ready"
    );

    // ─── 3) analyze ──────────────────────────────────────────────────
    let start = Instant::now();
    let result = pipeline::run(&config)?;
    for (key, metric) in result.iter() {
        match metric {
            Metric::Number(n) => info!(metric = key, value = n, "result"),
            Metric::Text(t) => info!(metric = key, value = %t, "result"),
            Metric::Table(t) => info!(metric = key, rows = t.row_count(), "result"),
            Metric::Unavailable(reason) => warn!(metric = key, %reason, "unavailable"),
        }
    }

    // ─── 4) export ───────────────────────────────────────────────────
    let bundle = socialscope::report::assemble(&result)?;
    let out = socialscope::report::write_bundle(&bundle, &config.output_dir())?;
    info!(out = %out.display(), elapsed = ?start.elapsed(), "all done");
    Ok(())
}
