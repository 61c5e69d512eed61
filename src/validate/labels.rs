use serde::Serialize;
use std::collections::BTreeMap;

use crate::extract::Extraction;
use crate::index::{reaches, LifeHistory, StockYearRecord};
use crate::parser::BiomassPoint;

/// Collapse status of one stock under a given threshold
#[derive(Debug, Clone, PartialEq)]
pub struct CollapseLabel {
    pub collapsed: bool,
    pub first_collapse_year: Option<i32>,
    pub min_ratio: f64,
    pub n_points: usize,
}

/// Per-stock collapse labels for one collapse threshold
#[derive(Debug, Clone, Default)]
pub struct CollapseLabels {
    pub threshold: f64,
    labels: BTreeMap<String, CollapseLabel>,
}

impl CollapseLabels {
    /// A stock is collapsed iff any biomass ratio is strictly below `threshold`
    pub fn build(biomass: &[BiomassPoint], threshold: f64) -> Self {
        let mut labels: BTreeMap<String, CollapseLabel> = BTreeMap::new();

        for point in biomass {
            let label = labels
                .entry(point.stock_id.clone())
                .or_insert(CollapseLabel {
                    collapsed: false,
                    first_collapse_year: None,
                    min_ratio: f64::INFINITY,
                    n_points: 0,
                });
            label.n_points += 1;
            label.min_ratio = label.min_ratio.min(point.ratio_to_reference);
            if point.ratio_to_reference < threshold {
                label.collapsed = true;
                label.first_collapse_year = Some(match label.first_collapse_year {
                    Some(year) => year.min(point.year),
                    None => point.year,
                });
            }
        }

        Self { threshold, labels }
    }

    pub fn get(&self, stock_id: &str) -> Option<&CollapseLabel> {
        self.labels.get(stock_id)
    }

    /// False for stocks without biomass data; use `get` to tell the cases apart
    pub fn collapsed(&self, stock_id: &str) -> bool {
        self.get(stock_id).map(|l| l.collapsed).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// True iff any of the stock's years has FMI at or above `threshold`
pub fn ever_danger(records: &[StockYearRecord], stock_id: &str, threshold: f64) -> bool {
    records
        .iter()
        .any(|r| r.stock_id == stock_id && reaches(r.fmi, threshold))
}

/// First year the stock's FMI reached `threshold`
pub fn first_signal_year(records: &[&StockYearRecord], threshold: f64) -> Option<i32> {
    records
        .iter()
        .filter(|r| reaches(r.fmi, threshold))
        .map(|r| r.year)
        .min()
}

/// One validation candidate: a stock with both an index series and a
/// biomass series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockSummary {
    pub stock_id: String,
    pub common_name: String,
    pub region: String,
    pub category: LifeHistory,
    pub m: f64,
    pub n_years: usize,
    pub max_fmi: f64,
    pub mean_fmi: f64,
    pub ever_danger: bool,
    pub first_danger_year: Option<i32>,
    pub collapsed: bool,
    pub min_biomass_ratio: f64,
    pub first_collapse_year: Option<i32>,
}

/// Build the candidate list; stocks without biomass data are skipped and
/// counted in the second return value
pub fn summarize_stocks(
    records: &[StockYearRecord],
    extraction: &Extraction,
    labels: &CollapseLabels,
    danger_threshold: f64,
) -> (Vec<StockSummary>, usize) {
    let mut by_stock: BTreeMap<&str, Vec<&StockYearRecord>> = BTreeMap::new();
    for record in records {
        by_stock.entry(record.stock_id.as_str()).or_default().push(record);
    }

    let mut summaries = Vec::new();
    let mut without_biomass = 0usize;

    for (stock_id, years) in by_stock {
        let Some(label) = labels.get(stock_id) else {
            without_biomass += 1;
            continue;
        };
        let first = years[0];
        let max_fmi = years.iter().map(|r| r.fmi).fold(f64::NEG_INFINITY, f64::max);
        let mean_fmi = years.iter().map(|r| r.fmi).sum::<f64>() / years.len() as f64;
        let first_danger_year = first_signal_year(&years, danger_threshold);
        let meta = extraction.stocks.get(stock_id);

        summaries.push(StockSummary {
            stock_id: stock_id.to_string(),
            common_name: meta.map(|s| s.common_name.clone()).unwrap_or_default(),
            region: meta.map(|s| s.region.clone()).unwrap_or_default(),
            category: first.category,
            m: first.m,
            n_years: years.len(),
            max_fmi,
            mean_fmi,
            ever_danger: first_danger_year.is_some(),
            first_danger_year,
            collapsed: label.collapsed,
            min_biomass_ratio: label.min_ratio,
            first_collapse_year: label.first_collapse_year,
        });
    }

    (summaries, without_biomass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{FValue, MortalityRow};
    use crate::index::{index_records, CategoryBreaks, ZoneBreaks};

    fn biomass(stock: &str, year: i32, ratio: f64) -> BiomassPoint {
        BiomassPoint {
            stock_id: stock.to_string(),
            year,
            ratio_to_reference: ratio,
        }
    }

    fn records(stock: &str, m: f64, fs: &[f64]) -> Vec<StockYearRecord> {
        let rows: Vec<MortalityRow> = fs
            .iter()
            .enumerate()
            .map(|(i, f)| MortalityRow {
                stock_id: stock.to_string(),
                year: 1980 + i as i32,
                f: FValue {
                    value: *f,
                    family: "direct".to_string(),
                    metric_code: "F-1/T".to_string(),
                },
                m,
            })
            .collect();
        index_records(&rows, &ZoneBreaks::default(), &CategoryBreaks::default()).unwrap()
    }

    #[test]
    fn test_collapse_threshold_is_strict() {
        let points = vec![
            biomass("A", 1990, 0.8),
            biomass("A", 1992, 0.3),
            biomass("A", 1991, 0.45),
            biomass("B", 1990, 0.5),
        ];
        let labels = CollapseLabels::build(&points, 0.5);

        assert!(labels.collapsed("A"));
        assert_eq!(labels.get("A").unwrap().first_collapse_year, Some(1991));
        assert_eq!(labels.get("A").unwrap().min_ratio, 0.3);
        assert!(!labels.collapsed("B"));
        assert!(!labels.collapsed("C"));
        assert!(labels.get("C").is_none());

        let severe = CollapseLabels::build(&points, 0.2);
        assert!(!severe.collapsed("A"));
    }

    #[test]
    fn test_ever_danger_scenarios() {
        let mut all = records("A", 0.2, &[0.1, 0.2, 0.3]);
        all.extend(records("B", 1.0, &[0.5, 0.5, 0.5]));

        assert!(ever_danger(&all, "A", 1.25));
        assert!(!ever_danger(&all, "B", 1.25));
        assert!(ever_danger(&all, "B", 0.5));
    }

    #[test]
    fn test_summaries_skip_stocks_without_biomass() {
        let mut all = records("A", 0.2, &[0.1, 0.2, 0.3]);
        all.extend(records("B", 1.0, &[0.5, 0.5, 0.5]));
        all.extend(records("C", 0.3, &[0.3]));
        let labels = CollapseLabels::build(
            &[biomass("A", 1983, 0.4), biomass("B", 1981, 0.9)],
            0.5,
        );

        let (summaries, skipped) =
            summarize_stocks(&all, &Extraction::default(), &labels, 1.25);
        assert_eq!(skipped, 1);
        assert_eq!(summaries.len(), 2);

        let a = &summaries[0];
        assert_eq!(a.stock_id, "A");
        assert!((a.max_fmi - 1.5).abs() < 1e-12);
        assert!((a.mean_fmi - 1.0).abs() < 1e-12);
        assert_eq!(a.first_danger_year, Some(1982));
        assert!(a.ever_danger && a.collapsed);
        assert_eq!(a.category, LifeHistory::Medium);

        let b = &summaries[1];
        assert!(!b.ever_danger && !b.collapsed);
        assert_eq!(b.first_danger_year, None);
    }
}
