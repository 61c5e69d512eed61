//! Chart rendering
//!
//! Chart selection, artifact planning and backend dispatch. A failed chart
//! is recorded and rendering continues with the next one.

pub mod charts;
pub mod palette;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::AnalysisConfig;
use crate::index::StockYearRecord;
use crate::ui::{Phase, Ui};
use crate::validate::ValidationReport;
use crate::writer::FailedArtifact;

pub use crate::source::{known_collapse_for, KnownCollapse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChartKind {
    MortalityScatter,
    CategoryScatter,
    RocCurves,
    FmiTimeseries,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::MortalityScatter,
        ChartKind::CategoryScatter,
        ChartKind::RocCurves,
        ChartKind::FmiTimeseries,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::MortalityScatter => "mortality_scatter",
            ChartKind::CategoryScatter => "category_scatter",
            ChartKind::RocCurves => "roc_curves",
            ChartKind::FmiTimeseries => "fmi_timeseries",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChartKind::MortalityScatter => "F against M with zone wedges",
            ChartKind::CategoryScatter => "peak FMI against M by life-history category",
            ChartKind::RocCurves => "overall and stratified ROC curves per collapse definition",
            ChartKind::FmiTimeseries => "FMI by year for stocks with a known collapse",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the charts draw from
pub struct ChartInputs<'a> {
    pub records: &'a [StockYearRecord],
    pub reports: &'a [ValidationReport],
    pub known_collapses: &'a [KnownCollapse],
    pub config: &'a AnalysisConfig,
}

/// One image file to produce
#[derive(Debug, Clone)]
pub enum Artifact<'a> {
    MortalityScatter,
    CategoryScatter,
    RocCurves(&'a ValidationReport),
    FmiTimeseries {
        stock_id: String,
        collapse: &'a KnownCollapse,
    },
}

impl Artifact<'_> {
    pub fn file_stem(&self) -> String {
        match self {
            Artifact::MortalityScatter => ChartKind::MortalityScatter.name().to_string(),
            Artifact::CategoryScatter => ChartKind::CategoryScatter.name().to_string(),
            Artifact::RocCurves(report) => format!(
                "{}_{}",
                ChartKind::RocCurves.name(),
                file_safe(&report.definition.name)
            ),
            Artifact::FmiTimeseries { stock_id, .. } => format!(
                "{}_{}",
                ChartKind::FmiTimeseries.name(),
                file_safe(stock_id)
            ),
        }
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Expand the selected chart kinds into concrete artifacts
pub fn plan_artifacts<'a>(kinds: &[ChartKind], inputs: &ChartInputs<'a>) -> Vec<Artifact<'a>> {
    let mut artifacts = Vec::new();
    for kind in kinds {
        match kind {
            ChartKind::MortalityScatter => artifacts.push(Artifact::MortalityScatter),
            ChartKind::CategoryScatter => artifacts.push(Artifact::CategoryScatter),
            ChartKind::RocCurves => {
                artifacts.extend(inputs.reports.iter().map(Artifact::RocCurves))
            }
            ChartKind::FmiTimeseries => {
                let stocks: BTreeSet<&str> =
                    inputs.records.iter().map(|r| r.stock_id.as_str()).collect();
                for stock_id in stocks {
                    if let Some(collapse) = known_collapse_for(inputs.known_collapses, stock_id) {
                        artifacts.push(Artifact::FmiTimeseries {
                            stock_id: stock_id.to_string(),
                            collapse,
                        });
                    }
                }
            }
        }
    }
    artifacts
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderOutcome {
    pub written: Vec<PathBuf>,
    pub failed: Vec<FailedArtifact>,
}

impl RenderOutcome {
    pub fn total(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

fn draw_artifact<DB>(
    root: &DrawingArea<DB, Shift>,
    artifact: &Artifact<'_>,
    inputs: &ChartInputs<'_>,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let zones = &inputs.config.index.zones;
    match artifact {
        Artifact::MortalityScatter => charts::draw_mortality_scatter(root, inputs.records, zones)?,
        Artifact::CategoryScatter => charts::draw_category_scatter(
            root,
            inputs.records,
            zones,
            &inputs.config.index.categories,
        )?,
        Artifact::RocCurves(report) => charts::draw_roc_curves(root, report)?,
        Artifact::FmiTimeseries { stock_id, collapse } => {
            let series: Vec<&StockYearRecord> = inputs
                .records
                .iter()
                .filter(|r| &r.stock_id == stock_id)
                .collect();
            charts::draw_fmi_timeseries(root, stock_id, &series, collapse, zones)?
        }
    }
    root.present()?;
    Ok(())
}

fn render_artifact(path: &Path, artifact: &Artifact<'_>, inputs: &ChartInputs<'_>) -> Result<()> {
    let render = &inputs.config.render;
    let size = (render.width, render.height);
    match render.format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_artifact(&root, artifact, inputs)
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_artifact(&root, artifact, inputs)
        }
    }
}

/// Render every artifact of the selected kinds into `figure_dir`.
///
/// Only a figure directory that cannot be created is an error here; a
/// chart that fails is recorded in the outcome and the rest still render.
pub fn render_charts<U: Ui>(
    kinds: &[ChartKind],
    inputs: &ChartInputs<'_>,
    figure_dir: &Path,
    ui: &mut U,
) -> Result<RenderOutcome> {
    std::fs::create_dir_all(figure_dir)
        .with_context(|| format!("Failed to create figure directory: {:?}", figure_dir))?;

    ui.set_phase(Phase::Rendering);
    let artifacts = plan_artifacts(kinds, inputs);
    let extension = inputs.config.render.format.extension();
    let total = artifacts.len() as u64;
    let mut outcome = RenderOutcome::default();

    for (i, artifact) in artifacts.iter().enumerate() {
        let path = figure_dir.join(format!("{}.{}", artifact.file_stem(), extension));
        ui.set_progress(i as u64, total, artifact.file_stem());

        match render_artifact(&path, artifact, inputs) {
            Ok(()) => outcome.written.push(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "chart failed");
                ui.log(format!("Failed to render {:?}: {:#}", path, e));
                outcome.failed.push(FailedArtifact {
                    path,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    ui.clear_progress();
    ui.log(format!(
        "Rendered {} of {} charts into {:?}",
        outcome.written.len(),
        outcome.total(),
        figure_dir
    ));
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SilentUi;

    fn record(stock_id: &str, year: i32) -> StockYearRecord {
        let zones = crate::index::ZoneBreaks::default();
        StockYearRecord {
            stock_id: stock_id.to_string(),
            year,
            f: 0.3,
            m: 0.2,
            fmi: 1.5,
            zone: zones.zone(1.5),
            category: crate::index::LifeHistory::Medium,
            f_family: "direct".to_string(),
            f_code: "F-1/T".to_string(),
        }
    }

    #[test]
    fn test_chart_names_round_trip() {
        for kind in ChartKind::ALL {
            assert_eq!(ChartKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ChartKind::from_name("pie"), None);
        assert_eq!(ImageFormat::Svg.extension(), "svg");
    }

    #[test]
    fn test_plan_timeseries_for_known_collapses_only() {
        let config = AnalysisConfig::default();
        let records = vec![
            record("CODNF2J3KL", 1990),
            record("CODNF2J3KL", 1991),
            record("HADGB", 1990),
            record("HERRNS", 1975),
        ];
        let inputs = ChartInputs {
            records: &records,
            reports: &[],
            known_collapses: &config.render.known_collapses,
            config: &config,
        };

        let artifacts = plan_artifacts(&ChartKind::ALL, &inputs);
        let stems: Vec<String> = artifacts.iter().map(|a| a.file_stem()).collect();
        assert_eq!(
            stems,
            vec![
                "mortality_scatter",
                "category_scatter",
                "fmi_timeseries_CODNF2J3KL",
                "fmi_timeseries_HERRNS",
            ]
        );
    }

    #[test]
    fn test_file_safe_names() {
        assert_eq!(file_safe("COD/NF 2J"), "COD_NF_2J");
        assert_eq!(file_safe("severe"), "severe");
    }

    #[test]
    fn test_unwritable_artifact_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the image file should go makes the write fail
        std::fs::create_dir(dir.path().join("mortality_scatter.png")).unwrap();

        let config = AnalysisConfig::default();
        let records = vec![record("HADGB", 1990)];
        let inputs = ChartInputs {
            records: &records,
            reports: &[],
            known_collapses: &[],
            config: &config,
        };

        let outcome = render_charts(
            &[ChartKind::MortalityScatter],
            &inputs,
            dir.path(),
            &mut SilentUi::new(),
        )
        .unwrap();
        assert!(outcome.written.is_empty());
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].path, dir.path().join("mortality_scatter.png"));
    }

    #[test]
    fn test_figure_dir_under_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let config = AnalysisConfig::default();
        let inputs = ChartInputs {
            records: &[],
            reports: &[],
            known_collapses: &[],
            config: &config,
        };
        let figures = blocker.join("figures");
        let result = render_charts(&ChartKind::ALL, &inputs, &figures, &mut SilentUi::new());
        assert!(result.is_err());
    }
}
