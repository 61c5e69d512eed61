//! Derive per-stock-year fishing mortality (F) from the time series and
//! inner-join it with the per-stock natural mortality (M) the source reader
//! aggregated.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{MetricFamily, SourceConfig};
use crate::parser::{BiomassPoint, StockRecord, TimeSeriesPoint};
use crate::source::{SourceTables, StockMortality};

/// The F value chosen for one stock-year, with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct FValue {
    pub value: f64,
    pub family: String,
    pub metric_code: String,
}

/// A stock-year that has both M and F
#[derive(Debug, Clone, PartialEq)]
pub struct MortalityRow {
    pub stock_id: String,
    pub year: i32,
    pub f: FValue,
    pub m: f64,
}

/// Median of a non-empty slice; sorts in place
pub(crate) fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[derive(Debug, Clone, Default)]
pub struct FishingMortality {
    pub by_stock_year: BTreeMap<(String, i32), FValue>,
    /// Number of stock-years won by each family
    pub family_wins: BTreeMap<String, usize>,
    /// Candidate observations discarded in favour of a higher-priority one
    pub superseded: usize,
}

/// Priority rank of a metric code: index of the first family it belongs to
pub fn metric_priority(code: &str, families: &[MetricFamily]) -> Option<usize> {
    families.iter().position(|family| family.matches(code))
}

/// Pick exactly one F per stock-year.
///
/// The highest-priority family wins outright; values are never averaged
/// across families. Within a family the lexicographically smallest code
/// wins so the choice does not depend on row order.
pub fn fishing_mortality(
    points: &[TimeSeriesPoint],
    families: &[MetricFamily],
) -> FishingMortality {
    let mut best: BTreeMap<(String, i32), (usize, &TimeSeriesPoint)> = BTreeMap::new();
    let mut candidates = 0usize;

    for point in points {
        let Some(rank) = metric_priority(&point.metric_code, families) else {
            continue;
        };
        candidates += 1;

        let key = (point.stock_id.clone(), point.year);
        let replace = match best.get(&key) {
            None => true,
            Some((best_rank, best_point)) => {
                (rank, point.metric_code.as_str()) < (*best_rank, best_point.metric_code.as_str())
            }
        };
        if replace {
            best.insert(key, (rank, point));
        }
    }

    let mut result = FishingMortality {
        superseded: candidates - best.len(),
        ..Default::default()
    };

    for (key, (rank, point)) in best {
        let family = families[rank].name.clone();
        *result.family_wins.entry(family.clone()).or_default() += 1;
        result.by_stock_year.insert(
            key,
            FValue {
                value: point.value,
                family,
                metric_code: point.metric_code.clone(),
            },
        );
    }

    result
}

/// Biomass-ratio observations used for collapse labelling
pub fn biomass_points(points: &[TimeSeriesPoint], biomass_metric: &str) -> Vec<BiomassPoint> {
    points
        .iter()
        .filter(|p| p.metric_code.starts_with(biomass_metric))
        .map(|p| BiomassPoint {
            stock_id: p.stock_id.clone(),
            year: p.year,
            ratio_to_reference: p.value,
        })
        .collect()
}

/// Row and stock counts at every step, so filtering losses are visible
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionSummary {
    pub stocks_read: usize,
    pub bioparam_rows: usize,
    pub m_rows_matched: usize,
    pub m_rows_non_numeric: usize,
    pub m_rows_out_of_range: usize,
    pub stocks_with_m: usize,
    pub timeseries_rows: usize,
    pub timeseries_rejected: usize,
    pub f_candidates_superseded: usize,
    pub f_stock_years: usize,
    pub stocks_with_f: usize,
    pub family_wins: BTreeMap<String, usize>,
    pub stocks_with_m_and_f: usize,
    pub stocks_retained: usize,
    pub stock_years_retained: usize,
    pub biomass_points: usize,
}

/// Everything the later stages need from the source dataset
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Metadata of the retained stocks only
    pub stocks: BTreeMap<String, StockRecord>,
    /// Joined stock-years, ordered by stock then year
    pub rows: Vec<MortalityRow>,
    pub biomass: Vec<BiomassPoint>,
    pub summary: ExtractionSummary,
}

/// Inner-join F onto the stocks that have both M and metadata
pub fn join(
    mortality: &BTreeMap<String, StockMortality>,
    f: &BTreeMap<(String, i32), FValue>,
) -> (BTreeMap<String, StockRecord>, Vec<MortalityRow>) {
    let mut retained = BTreeMap::new();
    let mut rows = Vec::new();

    for ((stock_id, year), f_value) in f {
        let Some(entry) = mortality.get(stock_id) else {
            continue;
        };
        retained
            .entry(stock_id.clone())
            .or_insert_with(|| entry.stock.clone());
        rows.push(MortalityRow {
            stock_id: stock_id.clone(),
            year: *year,
            f: f_value.clone(),
            m: entry.m,
        });
    }

    (retained, rows)
}

/// Run the whole extraction stage
pub fn extract(tables: &SourceTables, source: &SourceConfig) -> Extraction {
    let m = &tables.natural_mortality;
    let f = fishing_mortality(&tables.timeseries, &source.metric_priority);
    let biomass = biomass_points(&tables.timeseries, &source.biomass_metric);

    let mut f_stocks: Vec<&str> = f.by_stock_year.keys().map(|(s, _)| s.as_str()).collect();
    f_stocks.dedup();
    let with_both = f_stocks
        .iter()
        .filter(|s| m.by_stock.contains_key(**s))
        .count();

    for stock_id in m.by_stock.keys() {
        if !f_stocks.contains(&stock_id.as_str()) {
            debug!(%stock_id, "dropped: natural mortality but no fishing mortality");
        }
    }

    let (stocks, rows) = join(&m.by_stock, &f.by_stock_year);

    let summary = ExtractionSummary {
        stocks_read: tables.stocks.len(),
        bioparam_rows: tables.bioparam_rows,
        m_rows_matched: m.matched_rows,
        m_rows_non_numeric: m.non_numeric,
        m_rows_out_of_range: m.out_of_range,
        stocks_with_m: m.stocks_with_m,
        timeseries_rows: tables.timeseries.len() + tables.timeseries_rejected,
        timeseries_rejected: tables.timeseries_rejected,
        f_candidates_superseded: f.superseded,
        f_stock_years: f.by_stock_year.len(),
        stocks_with_f: f_stocks.len(),
        family_wins: f.family_wins.clone(),
        stocks_with_m_and_f: with_both,
        stocks_retained: stocks.len(),
        stock_years_retained: rows.len(),
        biomass_points: biomass.len(),
    };

    Extraction {
        stocks,
        rows,
        biomass,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::NaturalMortality;

    fn point(stock: &str, year: i32, code: &str, value: f64) -> TimeSeriesPoint {
        TimeSeriesPoint {
            stock_id: stock.to_string(),
            year,
            metric_code: code.to_string(),
            value,
        }
    }

    fn stock(id: &str) -> StockRecord {
        StockRecord {
            stock_id: id.to_string(),
            common_name: format!("{} fish", id),
            region: "Atlantic".to_string(),
            scientific_name: "Gadus morhua".to_string(),
        }
    }

    fn mortality(values: &[(&str, f64)]) -> BTreeMap<String, StockMortality> {
        values
            .iter()
            .map(|(id, m)| {
                (
                    id.to_string(),
                    StockMortality {
                        stock: stock(id),
                        m: *m,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_median_even_length() {
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_priority_picks_direct_over_proxies() {
        let families = SourceConfig::default().metric_priority;
        let points = vec![
            point("A", 2000, "ER-ratio", 0.4),
            point("A", 2000, "F-1/T", 0.3),
            point("A", 2000, "HR-ratio", 0.2),
            point("A", 2001, "HR-ratio", 0.2),
            point("A", 2001, "ER-ratio", 0.5),
            point("A", 2002, "HR-ratio", 0.6),
            point("A", 2002, "BdivBmsypref", 0.8),
        ];
        let f = fishing_mortality(&points, &families);

        assert_eq!(f.by_stock_year.len(), 3);
        let y2000 = &f.by_stock_year[&("A".to_string(), 2000)];
        assert_eq!(y2000.value, 0.3);
        assert_eq!(y2000.family, "direct");
        assert_eq!(f.by_stock_year[&("A".to_string(), 2001)].value, 0.5);
        assert_eq!(f.by_stock_year[&("A".to_string(), 2002)].family, "harvest_rate");
        assert_eq!(f.superseded, 3);
        assert_eq!(f.family_wins["direct"], 1);
    }

    #[test]
    fn test_priority_within_family_is_order_independent() {
        let families = SourceConfig::default().metric_priority;
        let forward = vec![
            point("A", 2000, "F-1/YR", 0.9),
            point("A", 2000, "F-1/T", 0.3),
        ];
        let reversed: Vec<_> = forward.iter().rev().cloned().collect();

        let a = fishing_mortality(&forward, &families);
        let b = fishing_mortality(&reversed, &families);
        assert_eq!(a.by_stock_year, b.by_stock_year);
        assert_eq!(a.by_stock_year[&("A".to_string(), 2000)].metric_code, "F-1/T");
    }

    #[test]
    fn test_join_is_inner() {
        let m = mortality(&[("A", 0.2), ("B", 0.4)]);
        let families = SourceConfig::default().metric_priority;
        let f = fishing_mortality(
            &[
                point("A", 2000, "F-1/T", 0.1),
                point("A", 2001, "F-1/T", 0.2),
                point("C", 2000, "F-1/T", 0.5),
                point("Z", 2000, "F-1/T", 0.5),
            ],
            &families,
        );

        let (retained, rows) = join(&m, &f.by_stock_year);
        assert_eq!(retained.keys().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.m == 0.2 && r.f.value >= 0.0));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let tables = SourceTables {
            stocks: vec![stock("A"), stock("B")],
            bioparam_rows: 2,
            natural_mortality: NaturalMortality {
                by_stock: mortality(&[("A", 0.2), ("B", 1.0)]),
                matched_rows: 2,
                stocks_with_m: 2,
                ..Default::default()
            },
            timeseries: vec![
                point("B", 2000, "F-1/T", 0.5),
                point("A", 2001, "ER-ratio", 0.2),
                point("A", 2000, "F-1/T", 0.1),
                point("A", 2000, "BdivBmsypref", 0.9),
            ],
            timeseries_rejected: 2,
        };
        let source = SourceConfig::default();
        let first = extract(&tables, &source);
        let second = extract(&tables, &source);

        assert_eq!(first.rows, second.rows);
        assert_eq!(first.rows.len(), 3);
        assert_eq!(first.rows[0].stock_id, "A");
        assert_eq!(first.rows[0].year, 2000);
        assert_eq!(first.summary.stocks_retained, 2);
        assert_eq!(first.summary.timeseries_rows, 6);
        assert_eq!(first.summary.biomass_points, 1);
    }
}
