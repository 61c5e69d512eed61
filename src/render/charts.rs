//! Chart drawing
//!
//! Every function draws onto an already-created drawing area so the same
//! code serves the bitmap and SVG backends. Axes that carry F, M or FMI are
//! logarithmic; values that cannot sit on a log axis (zero) are left out.

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

use crate::index::{CategoryBreaks, LifeHistory, StockYearRecord, Zone, ZoneBreaks};
use crate::source::KnownCollapse;
use crate::validate::{RocCurve, ValidationReport};

use super::palette::{category_color, zone_color, COLLAPSE_MARKER};

const CAPTION_FONT: (&str, i32) = ("sans-serif", 22);
/// Multiplicative headroom around the data on log axes
const LOG_PAD: f64 = 1.5;
const DIAGONAL_SAMPLES: usize = 64;

/// Padded `(low, high)` bounds of the positive finite values, widened to
/// include `include`
pub(crate) fn log_bounds(values: impl IntoIterator<Item = f64>, include: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .chain(include.iter().copied())
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return (0.01, 10.0);
    }
    (lo / LOG_PAD, hi * LOG_PAD)
}

/// `n` points evenly spaced in log space from `lo` to `hi`
pub(crate) fn log_space(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    let (a, b) = (lo.ln(), hi.ln());
    (0..n)
        .map(|i| (a + (b - a) * i as f64 / (n - 1) as f64).exp())
        .collect()
}

/// Outline of the region `k_lo * x <= y < k_hi * x`, clamped to the y range
pub(crate) fn wedge_polygon(k_lo: f64, k_hi: f64, x: (f64, f64), y: (f64, f64)) -> Vec<(f64, f64)> {
    let xs = log_space(x.0, x.1, DIAGONAL_SAMPLES);
    let clamp = |v: f64| v.clamp(y.0, y.1);
    let mut outline: Vec<(f64, f64)> = xs.iter().map(|&x| (x, clamp(k_hi * x))).collect();
    outline.extend(xs.iter().rev().map(|&x| (x, clamp(k_lo * x))));
    outline
}

/// Points of the line `y = k * x` that fall inside the y range
fn diagonal(k: f64, x: (f64, f64), y: (f64, f64)) -> Vec<(f64, f64)> {
    log_space(x.0, x.1, DIAGONAL_SAMPLES)
        .into_iter()
        .map(|x| (x, k * x))
        .filter(|(_, v)| *v >= y.0 && *v <= y.1)
        .collect()
}

/// F against M, zone wedges between the diagonals, points colored by zone
pub fn draw_mortality_scatter<DB>(
    root: &DrawingArea<DB, Shift>,
    records: &[StockYearRecord],
    zones: &ZoneBreaks,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let points: Vec<&StockYearRecord> = records.iter().filter(|r| r.f > 0.0).collect();
    debug!(
        plotted = points.len(),
        skipped = records.len() - points.len(),
        "mortality scatter"
    );
    let x = log_bounds(points.iter().map(|r| r.m), &[]);
    let y = log_bounds(points.iter().map(|r| r.f), &[]);

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption("Fishing vs natural mortality", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((x.0..x.1).log_scale(), (y.0..y.1).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("natural mortality M (1/yr)")
        .y_desc("fishing mortality F (1/yr)")
        .draw()?;

    for zone in Zone::ALL {
        chart.draw_series(std::iter::once(Polygon::new(
            wedge_polygon(zones.lower_bound(zone), zones.upper_bound(zone), x, y),
            zone_color(zone).mix(0.15).filled(),
        )))?;
    }
    for k in [zones.caution, zones.warning, zones.danger] {
        chart.draw_series(LineSeries::new(diagonal(k, x, y), BLACK.mix(0.4)))?;
    }

    for zone in Zone::ALL {
        let color = zone_color(zone);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|r| r.zone == zone)
                    .map(|r| Circle::new((r.m, r.f), 2, color.filled())),
            )?
            .label(zone.label())
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Maximum FMI of each stock against its M, colored by life-history category
pub fn draw_category_scatter<DB>(
    root: &DrawingArea<DB, Shift>,
    records: &[StockYearRecord],
    zones: &ZoneBreaks,
    categories: &CategoryBreaks,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut stocks: BTreeMap<&str, (f64, f64, LifeHistory)> = BTreeMap::new();
    for r in records {
        let entry = stocks
            .entry(r.stock_id.as_str())
            .or_insert((r.m, r.fmi, r.category));
        entry.1 = entry.1.max(r.fmi);
    }
    let points: Vec<(f64, f64, LifeHistory)> =
        stocks.into_values().filter(|(_, fmi, _)| *fmi > 0.0).collect();

    let x = log_bounds(points.iter().map(|p| p.0), &categories.breakpoints());
    let y = log_bounds(points.iter().map(|p| p.1), &[zones.danger]);

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption("Peak FMI by life history", CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((x.0..x.1).log_scale(), (y.0..y.1).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("natural mortality M (1/yr)")
        .y_desc("maximum F/M")
        .draw()?;

    for m in categories.breakpoints() {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(m, y.0), (m, y.1)],
            BLACK.mix(0.15),
        )))?;
    }
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(x.0, zones.danger), (x.1, zones.danger)],
        zone_color(Zone::Danger),
    )))?;

    for category in LifeHistory::ALL {
        let color = category_color(category);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.2 == category)
                    .map(|p| Circle::new((p.0, p.1), 3, color.filled())),
            )?
            .label(category.label())
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// (FPR, TPR) path of a curve, anchored at both corners
fn roc_path(curve: &RocCurve) -> Vec<(f64, f64)> {
    let mut path: Vec<(f64, f64)> = curve.points.iter().map(|p| (p.fpr, p.tpr)).collect();
    path.push((0.0, 0.0));
    path.push((1.0, 1.0));
    path.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    path
}

/// Overall ROC plus every valid stratum, optimal points marked
pub fn draw_roc_curves<DB>(root: &DrawingArea<DB, Shift>, report: &ValidationReport) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(
            format!(
                "ROC, {} (biomass ratio < {})",
                report.definition.name, report.definition.threshold
            ),
            CAPTION_FONT,
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0f64..1.0f64, 0.0f64..1.0f64)?;

    chart
        .configure_mesh()
        .x_desc("false positive rate")
        .y_desc("true positive rate")
        .draw()?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, 0.0), (1.0, 1.0)],
        BLACK.mix(0.3),
    )))?;

    let mut curves: Vec<(String, RGBColor, &RocCurve)> = Vec::new();
    if let Some(curve) = report.overall.curve() {
        curves.push(("all stocks".to_string(), BLACK, curve));
    }
    for stratum in report.valid_strata() {
        if let Some(curve) = stratum.outcome.curve() {
            curves.push((stratum.category.to_string(), category_color(stratum.category), curve));
        }
    }

    for (name, color, curve) in curves {
        chart
            .draw_series(LineSeries::new(roc_path(curve), color.stroke_width(2)))?
            .label(format!("{} (AUC {:.2}, n={})", name, curve.auc, curve.n_stocks))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        let optimal = curve.optimal;
        chart.draw_series(std::iter::once(Circle::new(
            (1.0 - optimal.specificity, optimal.sensitivity),
            5,
            color.filled(),
        )))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// FMI by year for one stock over horizontal zone bands, with a marker at
/// the known collapse year
pub fn draw_fmi_timeseries<DB>(
    root: &DrawingArea<DB, Shift>,
    stock_id: &str,
    records: &[&StockYearRecord],
    collapse: &KnownCollapse,
    zones: &ZoneBreaks,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut series: Vec<(f64, f64, Zone)> = records
        .iter()
        .filter(|r| r.fmi > 0.0)
        .map(|r| (r.year as f64, r.fmi, r.zone))
        .collect();
    series.sort_by(|a, b| a.0.total_cmp(&b.0));

    let marker = collapse.collapse_year as f64;
    let (x0, x1) = series
        .iter()
        .map(|p| p.0)
        .chain(std::iter::once(marker))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let x = (x0 - 1.0, x1 + 1.0);
    let y = log_bounds(series.iter().map(|p| p.1), &[zones.caution, zones.danger]);

    let caption = if collapse.label.is_empty() {
        stock_id.to_string()
    } else {
        format!("{} ({})", stock_id, collapse.label)
    };

    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(root)
        .caption(caption, CAPTION_FONT)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x.0..x.1, (y.0..y.1).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("year")
        .y_desc("F/M")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;

    for zone in Zone::ALL {
        let lo = zones.lower_bound(zone).max(y.0);
        let hi = zones.upper_bound(zone).min(y.1);
        if lo < hi {
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x.0, lo), (x.1, hi)],
                zone_color(zone).mix(0.15).filled(),
            )))?;
        }
    }

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(marker, y.0), (marker, y.1)],
            COLLAPSE_MARKER.stroke_width(2),
        )))?
        .label(format!("collapse {}", collapse.collapse_year))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], COLLAPSE_MARKER));

    chart.draw_series(LineSeries::new(series.iter().map(|p| (p.0, p.1)), &BLACK))?;
    chart.draw_series(
        series
            .iter()
            .map(|p| Circle::new((p.0, p.1), 3, zone_color(p.2).filled())),
    )?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}
