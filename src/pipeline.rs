//! Stage orchestration for the CLI
//!
//! Runs load, extract, index, validate, write and render in order, reporting
//! counts through [`Ui`] at every step.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use crate::config::AnalysisConfig;
use crate::extract::{extract, Extraction, ExtractionSummary};
use crate::index::{index_records, zone_summary, StockYearRecord, ZoneSummaryRow};
use crate::render::{render_charts, ChartInputs, ChartKind, RenderOutcome};
use crate::source::{
    load_known_collapses, resolve_source, KnownCollapse, SourceReader, SourceTables,
};
use crate::ui::{Phase, Ui};
use crate::validate::{
    run_validation, ClassificationMetrics, CollapseDefinition, ComparisonOutcome, ConfusionMatrix,
    LeadTimeStats, MetricComparison, OptimalThreshold, StratumRow, ValidationReport, Validity,
};
use crate::writer::{write_validation_tables, FailedArtifact, OutputWriter};

/// How much of the pipeline a command runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Stock-year table only
    Extract,
    /// Every table, no charts
    Validate,
    /// Charts only
    Render,
    /// Tables, summary JSON and charts
    Run,
}

impl Stage {
    fn validates(&self) -> bool {
        !matches!(self, Stage::Extract)
    }

    fn writes_tables(&self) -> bool {
        !matches!(self, Stage::Render)
    }

    fn renders(&self) -> bool {
        matches!(self, Stage::Render | Stage::Run)
    }
}

/// Locate the source dataset and read its three tables
pub fn load_source<U: Ui>(config: &AnalysisConfig, ui: &mut U) -> Result<(PathBuf, SourceTables)> {
    ui.set_phase(Phase::Loading);
    let path = resolve_source(&config.paths.candidates)?;
    ui.set_info(format!("Source: {:?}", path));

    let reader = SourceReader::open(&path)?;
    let tables = reader.load(&config.source)?;
    ui.set_info(format!(
        "{} stocks, {} bioparameter rows, {} time-series rows ({} rejected)",
        tables.stocks.len(),
        tables.bioparam_rows,
        tables.timeseries.len(),
        tables.timeseries_rejected
    ));
    Ok((path, tables))
}

/// Known-collapse reference rows: the external CSV when one is configured,
/// otherwise the built-in table
pub fn known_collapses(config: &AnalysisConfig) -> Result<Vec<KnownCollapse>> {
    match &config.paths.collapse_table {
        Some(path) => load_known_collapses(path),
        None => Ok(config.render.known_collapses.clone()),
    }
}

/// In-memory result of the analysis stages
#[derive(Debug, Clone)]
pub struct Analysis {
    pub extraction: Extraction,
    pub records: Vec<StockYearRecord>,
    pub zones: Vec<ZoneSummaryRow>,
    /// One report per collapse definition; empty when validation was skipped
    pub reports: Vec<ValidationReport>,
}

fn report_extraction<U: Ui>(summary: &ExtractionSummary, ui: &mut U) {
    ui.set_info(format!(
        "M for {} stocks ({} rows matched, {} out of range, {} non-numeric)",
        summary.stocks_with_m,
        summary.m_rows_matched,
        summary.m_rows_out_of_range,
        summary.m_rows_non_numeric
    ));
    let wins: Vec<String> = summary
        .family_wins
        .iter()
        .map(|(family, n)| format!("{}={}", family, n))
        .collect();
    ui.set_info(format!(
        "F for {} stock-years across {} stocks ({}; {} superseded)",
        summary.f_stock_years,
        summary.stocks_with_f,
        wins.join(", "),
        summary.f_candidates_superseded
    ));
    ui.set_info(format!(
        "Retained {} stocks, {} stock-years; {} biomass points",
        summary.stocks_retained, summary.stock_years_retained, summary.biomass_points
    ));
}

fn report_validation<U: Ui>(report: &ValidationReport, ui: &mut U) {
    let overall = match report.overall.curve() {
        Some(curve) => format!(
            "AUC {:.3}, optimal F/M {:.2} (sens {:.3}, spec {:.3})",
            curve.auc, curve.optimal.threshold, curve.optimal.sensitivity, curve.optimal.specificity
        ),
        None => match report.overall.validity() {
            Validity::Invalid { reason } => format!("ROC invalid: {}", reason),
            Validity::Valid => String::new(),
        },
    };
    ui.set_info(format!(
        "{} (ratio < {}): {} candidates, {} collapsed, {} without biomass; {}",
        report.definition.name,
        report.definition.threshold,
        report.summaries.len(),
        report.n_collapsed(),
        report.stocks_without_biomass,
        overall
    ));
    ui.set_info(format!(
        "  {} of {} strata valid; {} stocks warned before collapse",
        report.valid_strata().count(),
        report.strata.len(),
        report.lead_stats.warned
    ));
}

/// Extract, index and (optionally) validate
pub fn analyze<U: Ui>(
    tables: &SourceTables,
    config: &AnalysisConfig,
    validate: bool,
    ui: &mut U,
) -> Result<Analysis> {
    ui.set_phase(Phase::Extracting);
    let extraction = extract(tables, &config.source);
    report_extraction(&extraction.summary, ui);
    if extraction.rows.is_empty() {
        warn!("no stock has natural mortality, fishing mortality and metadata");
    }

    ui.set_phase(Phase::Indexing);
    let records = index_records(&extraction.rows, &config.index.zones, &config.index.categories)
        .context("Failed to compute the F/M index")?;
    let zones = zone_summary(&records);
    for row in &zones {
        let share = match row.share_of_stock_years.value() {
            Some(share) => format!("{:>5.1}%", share * 100.0),
            None => "    NA".to_string(),
        };
        ui.set_info(format!(
            "{:<8} {:>7} stock-years {}, reached by {} stocks",
            row.zone.label(),
            row.stock_years,
            share,
            row.stocks_reached
        ));
    }

    let mut reports = Vec::new();
    if validate {
        ui.set_phase(Phase::Validating);
        for definition in CollapseDefinition::all(config) {
            let report = run_validation(&records, &extraction, &definition, config);
            report_validation(&report, ui);
            reports.push(report);
        }
    }

    Ok(Analysis {
        extraction,
        records,
        zones,
        reports,
    })
}

/// Headline validation numbers for one collapse definition
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub definition: CollapseDefinition,
    pub candidates: usize,
    pub collapsed: usize,
    pub stocks_without_biomass: usize,
    pub universal_threshold: f64,
    pub universal: ConfusionMatrix,
    pub universal_metrics: ClassificationMetrics,
    pub overall: Validity,
    pub auc: Option<f64>,
    pub optimal: Option<OptimalThreshold>,
    pub strata: Vec<StratumRow>,
    pub comparison: Validity,
    pub comparison_stocks: Option<usize>,
    pub comparison_metrics: Vec<MetricComparison>,
    pub lead_times: LeadTimeStats,
}

impl ValidationSummary {
    pub fn new(report: &ValidationReport) -> Self {
        let curve = report.overall.curve();
        let comparison = report.comparison.comparison();
        Self {
            definition: report.definition.clone(),
            candidates: report.summaries.len(),
            collapsed: report.n_collapsed(),
            stocks_without_biomass: report.stocks_without_biomass,
            universal_threshold: report.universal_threshold,
            universal: report.universal,
            universal_metrics: report.universal.metrics(),
            overall: report.overall.validity(),
            auc: curve.map(|c| c.auc),
            optimal: curve.map(|c| c.optimal),
            strata: report.strata.iter().map(|s| s.row()).collect(),
            comparison: match &report.comparison {
                ComparisonOutcome::Valid(_) => Validity::Valid,
                ComparisonOutcome::Invalid { reason } => Validity::Invalid {
                    reason: reason.clone(),
                },
            },
            comparison_stocks: comparison.map(|c| c.n_stocks),
            comparison_metrics: comparison.map(|c| c.metrics.clone()).unwrap_or_default(),
            lead_times: report.lead_stats.clone(),
        }
    }
}

/// Contents of `run_summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: PathBuf,
    pub extraction: ExtractionSummary,
    pub zones: Vec<ZoneSummaryRow>,
    pub validation: Vec<ValidationSummary>,
    pub tables: Vec<PathBuf>,
    pub charts: Vec<PathBuf>,
    pub failed_tables: Vec<FailedArtifact>,
    pub failed_charts: Vec<FailedArtifact>,
}

/// What a pipeline invocation produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub render: Option<RenderOutcome>,
    /// Tables and JSON documents that could not be written, including
    /// `run_summary.json` itself
    pub failed_tables: Vec<FailedArtifact>,
    pub tables_attempted: usize,
}

impl RunReport {
    /// Number of charts that could not be written
    pub fn failed_charts(&self) -> usize {
        self.render.as_ref().map(|r| r.failed.len()).unwrap_or(0)
    }

    /// Tables and charts that could not be written
    pub fn failed_artifacts(&self) -> usize {
        self.failed_tables.len() + self.failed_charts()
    }

    pub fn attempted_artifacts(&self) -> usize {
        self.tables_attempted + self.render.as_ref().map(|r| r.total()).unwrap_or(0)
    }
}

/// Write every table for `stage`; failures are recorded on `out`
fn write_tables(out: &mut OutputWriter, analysis: &Analysis, stage: Stage) {
    out.write_table("stock_years.csv", &analysis.records);
    if stage == Stage::Extract {
        return;
    }
    out.write_table("zone_summary.csv", &analysis.zones);
    for report in &analysis.reports {
        write_validation_tables(out, report);
    }
}

/// Run the pipeline up to `stage`
pub fn run<U: Ui>(
    stage: Stage,
    config: &AnalysisConfig,
    charts: &[ChartKind],
    ui: &mut U,
) -> Result<RunReport> {
    // Load the reference table first so a bad path fails before any work
    let collapses = if stage.renders() {
        known_collapses(config)?
    } else {
        Vec::new()
    };

    let (source, tables) = load_source(config, ui)?;
    let analysis = analyze(&tables, config, stage.validates(), ui)?;

    let mut writer = None;
    if stage.writes_tables() {
        ui.set_phase(Phase::Writing);
        let mut out = OutputWriter::new(&config.paths.output_dir)?;
        write_tables(&mut out, &analysis, stage);
        for failed in out.failed() {
            ui.log(format!("Failed to write {:?}: {}", failed.path, failed.error));
        }
        ui.set_info(format!(
            "Wrote {} of {} tables to {:?}",
            out.written().len(),
            out.written().len() + out.failed().len(),
            out.dir()
        ));
        writer = Some(out);
    }

    let render = if stage.renders() {
        let inputs = ChartInputs {
            records: &analysis.records,
            reports: &analysis.reports,
            known_collapses: &collapses,
            config,
        };
        Some(render_charts(charts, &inputs, &config.paths.figure_dir, ui)?)
    } else {
        None
    };

    let summary = RunSummary {
        source,
        extraction: analysis.extraction.summary.clone(),
        zones: analysis.zones.clone(),
        validation: analysis.reports.iter().map(ValidationSummary::new).collect(),
        tables: writer
            .as_ref()
            .map(|w| w.written().to_vec())
            .unwrap_or_default(),
        charts: render.as_ref().map(|r| r.written.clone()).unwrap_or_default(),
        failed_tables: writer
            .as_ref()
            .map(|w| w.failed().to_vec())
            .unwrap_or_default(),
        failed_charts: render.as_ref().map(|r| r.failed.clone()).unwrap_or_default(),
    };

    if stage == Stage::Run {
        if let Some(out) = writer.as_mut() {
            match out.write_document("run_summary.json", &summary) {
                Some(path) => ui.log(format!("Summary: {:?}", path)),
                None => ui.log("Failed to write run_summary.json"),
            }
        }
    }

    let (failed_tables, tables_attempted) = writer
        .map(|w| (w.failed().to_vec(), w.written().len() + w.failed().len()))
        .unwrap_or_default();

    ui.set_phase(Phase::Complete);
    Ok(RunReport {
        summary,
        render,
        failed_tables,
        tables_attempted,
    })
}
