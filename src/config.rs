//! Analysis configuration
//!
//! Every threshold, path and metric code the pipeline uses lives here. The
//! defaults reproduce the published analysis; a TOML file can override any
//! section, and CLI flags override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AnalysisError;
use crate::index::{CategoryBreaks, ZoneBreaks};
use crate::render::ImageFormat;
use crate::source::KnownCollapse;
use crate::validate::ThresholdSweep;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub paths: PathsConfig,
    pub source: SourceConfig,
    pub index: IndexConfig,
    pub validation: ValidationConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Candidate locations of the source dataset, tried in order
    pub candidates: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub figure_dir: PathBuf,
    /// Optional CSV of known collapses (stock_pattern,collapse_year,label)
    pub collapse_table: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                PathBuf::from("data/ramldb.sqlite"),
                PathBuf::from("../data/ramldb.sqlite"),
                PathBuf::from("ramldb.sqlite"),
            ],
            output_dir: PathBuf::from("output"),
            figure_dir: PathBuf::from("output/figures"),
            collapse_table: None,
        }
    }
}

/// How multiple natural-mortality rows for one stock are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MAggregation {
    #[default]
    Mean,
    Median,
}

/// A family of time-series codes that measure fishing pressure.
/// Position in `SourceConfig::metric_priority` is its priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub name: String,
    pub code_prefix: String,
}

impl MetricFamily {
    pub fn new(name: &str, code_prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            code_prefix: code_prefix.to_string(),
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        code.starts_with(&self.code_prefix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub natural_mortality_prefix: String,
    /// Exclusive lower bound on accepted M values
    pub m_min: f64,
    /// Exclusive upper bound on accepted M values
    pub m_max: f64,
    pub m_aggregation: MAggregation,
    pub metric_priority: Vec<MetricFamily>,
    /// Time-series code prefix of the biomass-to-reference ratio
    pub biomass_metric: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            natural_mortality_prefix: "M-".to_string(),
            m_min: 0.0,
            m_max: 5.0,
            m_aggregation: MAggregation::Mean,
            metric_priority: vec![
                MetricFamily::new("direct", "F-"),
                MetricFamily::new("exploitation_rate", "ER-"),
                MetricFamily::new("harvest_rate", "HR-"),
            ],
            biomass_metric: "BdivBmsypref".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub zones: ZoneBreaks,
    pub categories: CategoryBreaks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub collapse_threshold: f64,
    pub severe_threshold: f64,
    pub min_stocks: usize,
    pub min_collapsed: usize,
    pub sweep: ThresholdSweep,
    /// Global threshold for the universal classification; the Danger
    /// breakpoint when unset
    pub universal_threshold: Option<f64>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            collapse_threshold: 0.5,
            severe_threshold: 0.2,
            min_stocks: 10,
            min_collapsed: 3,
            sweep: ThresholdSweep::default(),
            universal_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub known_collapses: Vec<KnownCollapse>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            width: 1200,
            height: 800,
            known_collapses: vec![
                KnownCollapse::new("CODNF", 1992, "Northern cod"),
                KnownCollapse::new("CODGB", 1994, "Georges Bank cod"),
                KnownCollapse::new("HERRNS", 1977, "North Sea herring"),
                KnownCollapse::new("ANCHOPERU", 1972, "Peruvian anchoveta"),
            ],
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from an optional TOML file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                toml::from_str::<AnalysisConfig>(&text)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            }
            None => AnalysisConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Threshold used for the universal classification
    pub fn universal_threshold(&self) -> f64 {
        self.validation
            .universal_threshold
            .unwrap_or(self.index.zones.danger)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.index.zones.validate()?;
        self.index.categories.validate()?;
        self.validation.sweep.validate()?;

        let source = &self.source;
        if !(source.m_min >= 0.0 && source.m_min < source.m_max) {
            return Err(AnalysisError::Config(format!(
                "M bounds must satisfy 0 <= m_min < m_max (got {} .. {})",
                source.m_min, source.m_max
            )));
        }
        if source.natural_mortality_prefix.is_empty() || source.biomass_metric.is_empty() {
            return Err(AnalysisError::Config(
                "metric code prefixes must not be empty".to_string(),
            ));
        }
        if source.metric_priority.is_empty() {
            return Err(AnalysisError::Config(
                "metric_priority needs at least one family".to_string(),
            ));
        }
        if let Some(family) = source
            .metric_priority
            .iter()
            .find(|f| f.code_prefix.is_empty())
        {
            return Err(AnalysisError::Config(format!(
                "metric family '{}' has an empty code prefix",
                family.name
            )));
        }

        let validation = &self.validation;
        for (name, value) in [
            ("collapse_threshold", validation.collapse_threshold),
            ("severe_threshold", validation.severe_threshold),
            ("universal_threshold", self.universal_threshold()),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnalysisError::Config(format!(
                    "{} must be positive (got {})",
                    name, value
                )));
            }
        }
        if validation.min_stocks == 0 {
            return Err(AnalysisError::Config(
                "min_stocks must be at least 1".to_string(),
            ));
        }

        if self.render.width == 0 || self.render.height == 0 {
            return Err(AnalysisError::Config(
                "chart dimensions must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.universal_threshold(), 1.25);
        assert_eq!(config.validation.min_stocks, 10);
        assert_eq!(config.validation.min_collapsed, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [validation]
            collapse_threshold = 0.4

            [source]
            m_aggregation = "median"
        "#;
        let config: AnalysisConfig = toml::from_str(text).unwrap();
        assert_eq!(config.validation.collapse_threshold, 0.4);
        assert_eq!(config.validation.severe_threshold, 0.2);
        assert_eq!(config.source.m_aggregation, MAggregation::Median);
        assert_eq!(config.source.metric_priority.len(), 3);
        assert_eq!(config.index.zones.danger, 1.25);
    }

    #[test]
    fn test_rejects_inverted_m_bounds() {
        let mut config = AnalysisConfig::default();
        config.source.m_min = 5.0;
        config.source.m_max = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_priority() {
        let mut config = AnalysisConfig::default();
        config.source.metric_priority.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metric_family_prefix_match() {
        let family = MetricFamily::new("direct", "F-");
        assert!(family.matches("F-1/T"));
        assert!(!family.matches("FdivFmsy"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fmi.toml");
        std::fs::write(&path, "[validation]\nmin_stocks = 12\n").unwrap();

        let config = AnalysisConfig::load(Some(&path)).unwrap();
        assert_eq!(config.validation.min_stocks, 12);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = AnalysisConfig::load(Some(Path::new("/nonexistent/fmi.toml")));
        assert!(result.is_err());
    }
}
