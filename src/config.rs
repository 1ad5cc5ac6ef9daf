//! Configuration file handling.
//!
//! Settings come from `.ranktracker.toml` when present; every key is
//! optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compare::InsightRules;
use crate::error::{Result, TrackerError};

pub const DEFAULT_CONFIG_FILE: &str = ".ranktracker.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub insights: InsightsConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable debug logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "rank_report.md".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Maximum keyword lines drawn in a business chart.
    #[serde(default = "default_series_limit")]
    pub series_limit: usize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            series_limit: default_series_limit(),
        }
    }
}

fn default_series_limit() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    #[serde(default = "default_review_target")]
    pub review_target: i64,

    #[serde(default = "default_rank_threshold")]
    pub rank_threshold: f64,

    #[serde(default = "default_fallback_competitor")]
    pub fallback_competitor: String,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            review_target: default_review_target(),
            rank_threshold: default_rank_threshold(),
            fallback_competitor: default_fallback_competitor(),
        }
    }
}

fn default_review_target() -> i64 {
    50
}

fn default_rank_threshold() -> f64 {
    2.0
}

fn default_fallback_competitor() -> String {
    "top competitor".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Emit one section per keyword.
    #[serde(default = "default_true")]
    pub include_keywords: bool,

    /// Emit one section per business.
    #[serde(default = "default_true")]
    pub include_businesses: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_keywords: true,
            include_businesses: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.ranktracker.toml` from the working directory if it exists.
    pub fn load_default() -> Result<Option<Self>> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chart.series_limit == 0 {
            return Err(TrackerError::Config(
                "chart.series_limit must be at least 1".to_string(),
            ));
        }
        if self.insights.review_target < 0 {
            return Err(TrackerError::Config(
                "insights.review_target cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn insight_rules(&self) -> InsightRules {
        InsightRules {
            review_target: self.insights.review_target,
            rank_threshold: self.insights.rank_threshold,
            fallback_competitor: self.insights.fallback_competitor.clone(),
        }
    }

    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default())
            .map_err(|e| TrackerError::Config(format!("failed to serialize defaults: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_behaviour() {
        let config = Config::default();
        assert_eq!(config.chart.series_limit, 8);
        assert_eq!(config.insights.review_target, 50);
        assert_eq!(config.insight_rules(), InsightRules::default());
        assert!(config.report.include_keywords);
    }

    #[test]
    fn partial_files_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
[general]
output = "march.md"

[insights]
review_target = 100
"#,
        )
        .unwrap();
        assert_eq!(config.general.output, "march.md");
        assert_eq!(config.insights.review_target, 100);
        assert_eq!(config.insights.rank_threshold, 2.0);
        assert_eq!(config.chart.series_limit, 8);
    }

    #[test]
    fn zero_series_limit_is_rejected() {
        let config: Config = toml::from_str("[chart]\nseries_limit = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
    }

    #[test]
    fn default_toml_lists_every_section() {
        let text = Config::default_toml().unwrap();
        assert!(!text.is_empty());
        assert!(text.contains("[general]"));
        assert!(text.contains("[chart]"));
        assert!(text.contains("[insights]"));
        assert!(text.contains("[report]"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.chart.series_limit, Config::default().chart.series_limit);
    }
}
