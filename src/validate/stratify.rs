use serde::Serialize;
use tracing::warn;

use crate::index::{reaches, LifeHistory};

use super::confusion::{ConfusionMatrix, Rate};
use super::labels::StockSummary;
use super::roc::{Observation, RocOutcome, ThresholdSweep};
use super::SampleRequirement;

/// ROC outcome for one life-history category
#[derive(Debug, Clone, PartialEq)]
pub struct StratumResult {
    pub category: LifeHistory,
    pub outcome: RocOutcome,
}

impl StratumResult {
    pub fn optimal_threshold(&self) -> Option<f64> {
        self.outcome.curve().map(|c| c.optimal.threshold)
    }

    pub fn row(&self) -> StratumRow {
        let curve = self.outcome.curve();
        StratumRow {
            category: self.category,
            n_stocks: self.outcome.n_stocks(),
            n_collapsed: self.outcome.n_collapsed(),
            valid: curve.is_some(),
            reason: match &self.outcome {
                RocOutcome::Invalid { reason, .. } => reason.clone(),
                RocOutcome::Valid(_) => String::new(),
            },
            auc: curve.map(|c| c.auc),
            optimal_threshold: curve.map(|c| c.optimal.threshold),
            sensitivity: curve.map(|c| c.optimal.sensitivity),
            specificity: curve.map(|c| c.optimal.specificity),
            youden_j: curve.map(|c| c.optimal.youden_j),
        }
    }
}

/// Flat form of a stratum for the CSV table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratumRow {
    pub category: LifeHistory,
    pub n_stocks: usize,
    pub n_collapsed: usize,
    pub valid: bool,
    pub reason: String,
    pub auc: Option<f64>,
    pub optimal_threshold: Option<f64>,
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
    pub youden_j: Option<f64>,
}

fn observations<'a>(summaries: impl IntoIterator<Item = &'a StockSummary>) -> Vec<Observation> {
    summaries
        .into_iter()
        .map(|s| Observation {
            max_fmi: s.max_fmi,
            collapsed: s.collapsed,
        })
        .collect()
}

/// Full ROC over every candidate
pub fn overall_roc(
    summaries: &[StockSummary],
    requirement: &SampleRequirement,
    sweep: &ThresholdSweep,
) -> RocOutcome {
    RocOutcome::evaluate(&observations(summaries), requirement, sweep)
}

/// One ROC per life-history category, in `LifeHistory::ALL` order.
/// Undersized categories come back `Invalid` and are never filled in.
pub fn stratified_roc(
    summaries: &[StockSummary],
    requirement: &SampleRequirement,
    sweep: &ThresholdSweep,
) -> Vec<StratumResult> {
    LifeHistory::ALL
        .iter()
        .map(|&category| {
            let members = summaries.iter().filter(|s| s.category == category);
            let outcome = RocOutcome::evaluate(&observations(members), requirement, sweep);
            if let RocOutcome::Invalid {
                n_stocks,
                n_collapsed,
                reason,
            } = &outcome
            {
                warn!(%category, n_stocks, n_collapsed, %reason, "stratum excluded");
            }
            StratumResult { category, outcome }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: &'static str,
    pub universal: Rate,
    pub stratified: Rate,
    /// `stratified - universal`
    pub delta: Rate,
}

/// Universal and stratified classification judged on the same stocks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub n_stocks: usize,
    pub strata_used: Vec<LifeHistory>,
    pub universal_threshold: f64,
    pub universal: ConfusionMatrix,
    pub stratified: ConfusionMatrix,
    pub metrics: Vec<MetricComparison>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOutcome {
    Valid(Comparison),
    Invalid { reason: String },
}

impl ComparisonOutcome {
    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            ComparisonOutcome::Valid(c) => Some(c),
            ComparisonOutcome::Invalid { .. } => None,
        }
    }
}

/// Classify each stock in a valid stratum twice: against the single
/// `universal_threshold` and against its own category's optimal threshold.
pub fn compare(
    summaries: &[StockSummary],
    strata: &[StratumResult],
    universal_threshold: f64,
) -> ComparisonOutcome {
    let optimal: Vec<(LifeHistory, f64)> = strata
        .iter()
        .filter_map(|s| s.optimal_threshold().map(|t| (s.category, t)))
        .collect();
    if optimal.is_empty() {
        return ComparisonOutcome::Invalid {
            reason: "no life-history stratum has a valid ROC".to_string(),
        };
    }

    let mut universal = ConfusionMatrix::default();
    let mut stratified = ConfusionMatrix::default();
    for summary in summaries {
        let Some(&(_, threshold)) = optimal.iter().find(|(c, _)| *c == summary.category) else {
            continue;
        };
        universal.add(reaches(summary.max_fmi, universal_threshold), summary.collapsed);
        stratified.add(reaches(summary.max_fmi, threshold), summary.collapsed);
    }

    let universal_metrics = universal.metrics().named();
    let stratified_metrics = stratified.metrics().named();
    let metrics = universal_metrics
        .iter()
        .zip(stratified_metrics.iter())
        .map(|(&(metric, u), &(_, s))| MetricComparison {
            metric,
            universal: u,
            stratified: s,
            delta: s.delta(&u),
        })
        .collect();

    ComparisonOutcome::Valid(Comparison {
        n_stocks: universal.n(),
        strata_used: optimal.iter().map(|(c, _)| *c).collect(),
        universal_threshold,
        universal,
        stratified,
        metrics,
    })
}
