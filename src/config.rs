// src/config.rs
use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::load::SourceRef;
use crate::metrics::TOP_N;
use crate::normalize::{Normalizer, ParseFailure};

/// File-name keywords identifying each export tool.
const TIKTOK_KEYWORDS: &[&str] = &["APIFY"];
const FASTMOSS_KEYWORDS: &[&str] = &["FASTMOSS"];
const FANPAGE_KEYWORDS: &[&str] = &["KARMA"];
const EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];

/// One run's inputs and knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub brand: Option<String>,
    /// Relative source files are resolved against this directory.
    pub data_dir: PathBuf,
    /// Output workbook directory; derived from the brand when unset.
    pub output: Option<PathBuf>,
    pub top_n: usize,
    pub on_parse_failure: ParseFailure,
    pub sources: Sources,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brand: None,
            data_dir: PathBuf::from("."),
            output: None,
            top_n: TOP_N,
            on_parse_failure: ParseFailure::default(),
            sources: Sources::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub tiktok: Option<SourceConfig>,
    pub fastmoss: Option<SourceConfig>,
    pub fanpage: Option<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub file: PathBuf,
    /// Load only this sheet. For FastMoss, a video, livestream or product
    /// sheet name feeds that analysis; any other sheet is an influencer list.
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub header_row: Option<usize>,
}

impl SourceConfig {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            sheet: None,
            header_row: None,
        }
    }

    pub fn source_ref(&self, data_dir: &Path) -> SourceRef {
        let path = if self.file.is_absolute() {
            self.file.clone()
        } else {
            data_dir.join(&self.file)
        };
        SourceRef {
            path,
            sheet: self.sheet.clone(),
            header_row: self.header_row,
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing YAML config")
    }

    /// Load a YAML config. A relative `data_dir` is taken relative to the
    /// config file's directory.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg =
            Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))?;
        if cfg.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                cfg.data_dir = parent.join(&cfg.data_dir);
            }
        }
        Ok(cfg)
    }

    /// Build a config by looking for `[APIFY] …`, `[FASTMOSS] …` and
    /// `[FANPAGE KARMA] …` exports in `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let tiktok = find_export(dir, TIKTOK_KEYWORDS)?;
        let fastmoss = find_export(dir, FASTMOSS_KEYWORDS)?;
        let fanpage = find_export(dir, FANPAGE_KEYWORDS)?;

        let brand = [&tiktok, &fastmoss, &fanpage]
            .into_iter()
            .flatten()
            .find_map(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(brand_from_file_name)
            });
        info!(
            dir = %dir.display(),
            brand = ?brand,
            tiktok = tiktok.is_some(),
            fastmoss = fastmoss.is_some(),
            fanpage = fanpage.is_some(),
            "discovered exports"
        );

        Ok(Self {
            brand,
            data_dir: dir.to_path_buf(),
            sources: Sources {
                tiktok: tiktok.map(SourceConfig::new),
                fastmoss: fastmoss.map(SourceConfig::new),
                fanpage: fanpage.map(SourceConfig::new),
            },
            ..Self::default()
        })
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.on_parse_failure)
    }

    /// `<data_dir>/<Brand>_Insights` unless `output` is set.
    pub fn output_dir(&self) -> PathBuf {
        if let Some(out) = &self.output {
            return out.clone();
        }
        let stem: String = self
            .brand
            .as_deref()
            .unwrap_or("Social")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        self.data_dir.join(format!("{}_Insights", stem))
    }
}

/// `"[APIFY] The Body Shop"` → `"The Body Shop"`.
pub fn brand_from_file_name(stem: &str) -> Option<String> {
    let rest = match stem.trim_start().strip_prefix('[') {
        Some(r) => r.split_once(']').map_or(r, |(_, after)| after),
        None => stem,
    };
    let brand = rest.trim();
    (!brand.is_empty()).then(|| brand.to_string())
}

fn find_export(dir: &Path, keywords: &[&str]) -> Result<Option<PathBuf>> {
    let opts = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let base = Pattern::escape(&dir.to_string_lossy());

    for keyword in keywords {
        for ext in EXTENSIONS {
            let pattern = format!("{}/*{}*.{}", base, keyword, ext);
            let mut hits: Vec<PathBuf> = glob_with(&pattern, opts)
                .with_context(|| format!("bad glob pattern {}", pattern))?
                .filter_map(Result::ok)
                .collect();
            hits.sort();
            if let Some(hit) = hits.into_iter().next() {
                debug!(keyword, file = %hit.display(), "matched export");
                return Ok(Some(hit));
            }
        }
    }
    Ok(None)
}
