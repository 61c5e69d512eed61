//! CSV and JSON artifacts

mod output;

pub use output::{CsvRow, FailedArtifact, OutputWriter};

use serde::Serialize;
use tracing::debug;

use crate::index::{StockYearRecord, ZoneSummaryRow};
use crate::validate::{
    ComparisonOutcome, LeadTimeRecord, MetricComparison, RocCurve, StockSummary, StratumRow,
    ValidationReport,
};

/// One swept threshold of one curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocPointRow {
    /// `all` or the life-history category
    pub curve: String,
    pub threshold: f64,
    pub tpr: f64,
    pub fpr: f64,
    pub youden_j: f64,
}

impl CsvRow for RocPointRow {
    const COLUMNS: &'static [&'static str] = &["curve", "threshold", "tpr", "fpr", "youden_j"];
}

impl CsvRow for StockYearRecord {
    const COLUMNS: &'static [&'static str] = &[
        "stock_id", "year", "f", "m", "fmi", "zone", "category", "f_family", "f_code",
    ];
}

impl CsvRow for ZoneSummaryRow {
    const COLUMNS: &'static [&'static str] =
        &["zone", "stock_years", "share_of_stock_years", "stocks_reached"];
}

impl CsvRow for StockSummary {
    const COLUMNS: &'static [&'static str] = &[
        "stock_id",
        "common_name",
        "region",
        "category",
        "m",
        "n_years",
        "max_fmi",
        "mean_fmi",
        "ever_danger",
        "first_danger_year",
        "collapsed",
        "min_biomass_ratio",
        "first_collapse_year",
    ];
}

impl CsvRow for StratumRow {
    const COLUMNS: &'static [&'static str] = &[
        "category",
        "n_stocks",
        "n_collapsed",
        "valid",
        "reason",
        "auc",
        "optimal_threshold",
        "sensitivity",
        "specificity",
        "youden_j",
    ];
}

impl CsvRow for MetricComparison {
    const COLUMNS: &'static [&'static str] = &["metric", "universal", "stratified", "delta"];
}

impl CsvRow for LeadTimeRecord {
    const COLUMNS: &'static [&'static str] = &[
        "stock_id",
        "first_danger_year",
        "first_collapse_year",
        "lead_time",
        "warned_before_collapse",
    ];
}

fn curve_rows<'a>(name: &str, curve: &'a RocCurve) -> impl Iterator<Item = RocPointRow> + 'a {
    let name = name.to_string();
    curve.points.iter().map(move |p| RocPointRow {
        curve: name.clone(),
        threshold: p.threshold,
        tpr: p.tpr,
        fpr: p.fpr,
        youden_j: p.youden(),
    })
}

pub fn roc_point_rows(report: &ValidationReport) -> Vec<RocPointRow> {
    let mut rows = Vec::new();
    if let Some(curve) = report.overall.curve() {
        rows.extend(curve_rows("all", curve));
    }
    for stratum in report.valid_strata() {
        if let Some(curve) = stratum.outcome.curve() {
            rows.extend(curve_rows(stratum.category.label(), curve));
        }
    }
    rows
}

/// Write the per-definition validation tables; file names carry the
/// definition name. The comparison table is skipped when it is invalid.
/// A table that cannot be written is recorded on `out` and the rest still go.
pub fn write_validation_tables(out: &mut OutputWriter, report: &ValidationReport) {
    let name = &report.definition.name;

    out.write_table(&format!("stock_summary_{}.csv", name), &report.summaries);
    out.write_table(&format!("roc_points_{}.csv", name), &roc_point_rows(report));

    let strata: Vec<_> = report.strata.iter().map(|s| s.row()).collect();
    out.write_table(&format!("stratified_roc_{}.csv", name), &strata);

    match &report.comparison {
        ComparisonOutcome::Valid(comparison) => {
            out.write_table(&format!("comparison_{}.csv", name), &comparison.metrics);
        }
        ComparisonOutcome::Invalid { reason } => {
            debug!(definition = %name, %reason, "comparison table skipped");
        }
    }

    out.write_table(&format!("lead_times_{}.csv", name), &report.lead_times);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{LifeHistory, Zone};
    use crate::validate::Rate;

    /// The header serde would derive from the row's field names
    fn derived_header<T: Serialize>(row: &T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        text.lines().next().unwrap().to_string()
    }

    fn assert_columns<T: CsvRow>(row: &T) {
        assert_eq!(T::COLUMNS.join(","), derived_header(row));
    }

    #[test]
    fn test_columns_match_field_names() {
        assert_columns(&RocPointRow {
            curve: "all".to_string(),
            threshold: 1.0,
            tpr: 0.5,
            fpr: 0.25,
            youden_j: 0.25,
        });
        assert_columns(&StockYearRecord {
            stock_id: "A".to_string(),
            year: 1990,
            f: 0.3,
            m: 0.2,
            fmi: 1.5,
            zone: Zone::Danger,
            category: LifeHistory::Medium,
            f_family: "F".to_string(),
            f_code: "F-1/T".to_string(),
        });
        assert_columns(&ZoneSummaryRow {
            zone: Zone::Safe,
            stock_years: 0,
            share_of_stock_years: Rate::Undefined,
            stocks_reached: 0,
        });
        assert_columns(&StockSummary {
            stock_id: "A".to_string(),
            common_name: "cod".to_string(),
            region: "Atlantic".to_string(),
            category: LifeHistory::Medium,
            m: 0.2,
            n_years: 3,
            max_fmi: 1.5,
            mean_fmi: 1.0,
            ever_danger: true,
            first_danger_year: Some(1990),
            collapsed: false,
            min_biomass_ratio: 0.8,
            first_collapse_year: None,
        });
        assert_columns(&StratumRow {
            category: LifeHistory::Medium,
            n_stocks: 12,
            n_collapsed: 4,
            valid: true,
            reason: String::new(),
            auc: Some(0.8),
            optimal_threshold: Some(1.0),
            sensitivity: Some(0.75),
            specificity: Some(0.5),
            youden_j: Some(0.25),
        });
        assert_columns(&MetricComparison {
            metric: "sensitivity",
            universal: Rate::Value(0.5),
            stratified: Rate::Value(0.75),
            delta: Rate::Value(0.25),
        });
        assert_columns(&LeadTimeRecord {
            stock_id: "A".to_string(),
            first_danger_year: 1985,
            first_collapse_year: 1990,
            lead_time: Some(5),
            warned_before_collapse: true,
        });
    }
}
