//! Validation of the index against historical collapses
//!
//! Each collapse definition gets its own [`ValidationReport`]: candidate
//! stocks, the universal contingency table, the overall and per-category
//! ROC curves, the universal-vs-stratified comparison and lead times.

pub mod confusion;
pub mod labels;
pub mod lead_time;
pub mod roc;
pub mod stratify;

use serde::Serialize;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::extract::Extraction;
use crate::index::{reaches, StockYearRecord};

pub use confusion::{ClassificationMetrics, ConfusionMatrix, Rate};
pub use labels::{ever_danger, summarize_stocks, CollapseLabel, CollapseLabels, StockSummary};
pub use lead_time::{lead_time, lead_time_records, lead_time_stats, LeadTimeRecord, LeadTimeStats};
pub use roc::{Observation, OptimalThreshold, RocCurve, RocOutcome, RocPoint, ThresholdSweep};
pub use stratify::{
    compare, overall_roc, stratified_roc, Comparison, ComparisonOutcome, MetricComparison,
    StratumResult, StratumRow,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Invalid { reason: String },
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

/// Minimum sample for a ROC to be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequirement {
    pub min_stocks: usize,
    pub min_collapsed: usize,
}

impl SampleRequirement {
    pub fn new(min_stocks: usize, min_collapsed: usize) -> Self {
        Self {
            min_stocks,
            min_collapsed,
        }
    }

    pub fn check(&self, n_stocks: usize, n_collapsed: usize) -> Validity {
        let reason = if n_stocks < self.min_stocks {
            format!("{} stocks, need at least {}", n_stocks, self.min_stocks)
        } else if n_collapsed < self.min_collapsed {
            format!(
                "{} collapsed stocks, need at least {}",
                n_collapsed, self.min_collapsed
            )
        } else if n_collapsed == n_stocks {
            "no non-collapsed stocks".to_string()
        } else {
            return Validity::Valid;
        };
        Validity::Invalid { reason }
    }
}

/// A named biomass-ratio threshold below which a stock counts as collapsed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollapseDefinition {
    pub name: String,
    pub threshold: f64,
}

impl CollapseDefinition {
    pub fn new(name: &str, threshold: f64) -> Self {
        Self {
            name: name.to_string(),
            threshold,
        }
    }

    /// Standard and severe definitions, in that order
    pub fn all(config: &AnalysisConfig) -> Vec<Self> {
        vec![
            Self::new("collapse", config.validation.collapse_threshold),
            Self::new("severe", config.validation.severe_threshold),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub definition: CollapseDefinition,
    pub summaries: Vec<StockSummary>,
    /// Indexed stocks skipped for lack of a biomass series
    pub stocks_without_biomass: usize,
    pub universal_threshold: f64,
    /// Every candidate classified against `universal_threshold`
    pub universal: ConfusionMatrix,
    pub overall: RocOutcome,
    pub strata: Vec<StratumResult>,
    pub comparison: ComparisonOutcome,
    pub lead_times: Vec<LeadTimeRecord>,
    pub lead_stats: LeadTimeStats,
}

impl ValidationReport {
    pub fn n_collapsed(&self) -> usize {
        self.summaries.iter().filter(|s| s.collapsed).count()
    }

    pub fn valid_strata(&self) -> impl Iterator<Item = &StratumResult> {
        self.strata.iter().filter(|s| s.outcome.curve().is_some())
    }
}

pub fn run_validation(
    records: &[StockYearRecord],
    extraction: &Extraction,
    definition: &CollapseDefinition,
    config: &AnalysisConfig,
) -> ValidationReport {
    let labels = CollapseLabels::build(&extraction.biomass, definition.threshold);
    let (summaries, stocks_without_biomass) =
        summarize_stocks(records, extraction, &labels, config.index.zones.danger);
    debug!(
        definition = %definition.name,
        candidates = summaries.len(),
        stocks_without_biomass,
        "validation candidates"
    );

    let universal_threshold = config.universal_threshold();
    let universal = ConfusionMatrix::from_pairs(
        summaries
            .iter()
            .map(|s| (reaches(s.max_fmi, universal_threshold), s.collapsed)),
    );

    let requirement = SampleRequirement::new(
        config.validation.min_stocks,
        config.validation.min_collapsed,
    );
    let sweep = &config.validation.sweep;
    let overall = overall_roc(&summaries, &requirement, sweep);
    let strata = stratified_roc(&summaries, &requirement, sweep);
    let comparison = compare(&summaries, &strata, universal_threshold);

    let lead_times = lead_time_records(&summaries);
    let lead_stats = lead_time_stats(&lead_times);

    ValidationReport {
        definition: definition.clone(),
        summaries,
        stocks_without_biomass,
        universal_threshold,
        universal,
        overall,
        strata,
        comparison,
        lead_times,
        lead_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_requirement() {
        let requirement = SampleRequirement::new(10, 3);
        assert!(requirement.check(10, 3).is_valid());
        assert!(!requirement.check(9, 3).is_valid());
        assert!(!requirement.check(40, 2).is_valid());
        assert_eq!(
            requirement.check(12, 12),
            Validity::Invalid {
                reason: "no non-collapsed stocks".to_string()
            }
        );
    }

    #[test]
    fn test_validity_serializes_reason() {
        let json = serde_json::to_string(&Validity::Invalid {
            reason: "2 stocks, need at least 10".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"invalid","reason":"2 stocks, need at least 10"}"#);
        assert_eq!(
            serde_json::to_string(&Validity::Valid).unwrap(),
            r#"{"status":"valid"}"#
        );
    }

    #[test]
    fn test_default_definitions() {
        let definitions = CollapseDefinition::all(&AnalysisConfig::default());
        assert_eq!(definitions[0], CollapseDefinition::new("collapse", 0.5));
        assert_eq!(definitions[1], CollapseDefinition::new("severe", 0.2));
    }
}
