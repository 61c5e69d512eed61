use serde::Serialize;

use super::labels::StockSummary;
use crate::extract::median;

/// Years of warning between the first danger signal and the first collapse
/// year; `None` unless the signal came strictly first
pub fn lead_time(first_danger_year: Option<i32>, first_collapse_year: Option<i32>) -> Option<i32> {
    match (first_danger_year, first_collapse_year) {
        (Some(danger), Some(collapse)) if collapse > danger => Some(collapse - danger),
        _ => None,
    }
}

/// One collapsed stock that also showed a danger signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeRecord {
    pub stock_id: String,
    pub first_danger_year: i32,
    pub first_collapse_year: i32,
    pub lead_time: Option<i32>,
    pub warned_before_collapse: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadTimeStats {
    /// Collapsed stocks with a danger signal
    pub candidates: usize,
    pub warned: usize,
    /// Signal in or after the collapse year
    pub not_warned: usize,
    pub median: Option<f64>,
    pub mean: Option<f64>,
    pub min: Option<i32>,
    pub max: Option<i32>,
}

pub fn lead_time_records(summaries: &[StockSummary]) -> Vec<LeadTimeRecord> {
    summaries
        .iter()
        .filter(|s| s.collapsed)
        .filter_map(|s| {
            let danger = s.first_danger_year?;
            let collapse = s.first_collapse_year?;
            let lead = lead_time(Some(danger), Some(collapse));
            Some(LeadTimeRecord {
                stock_id: s.stock_id.clone(),
                first_danger_year: danger,
                first_collapse_year: collapse,
                lead_time: lead,
                warned_before_collapse: lead.is_some(),
            })
        })
        .collect()
}

pub fn lead_time_stats(records: &[LeadTimeRecord]) -> LeadTimeStats {
    let leads: Vec<i32> = records.iter().filter_map(|r| r.lead_time).collect();
    let mut stats = LeadTimeStats {
        candidates: records.len(),
        warned: leads.len(),
        not_warned: records.len() - leads.len(),
        ..Default::default()
    };
    if leads.is_empty() {
        return stats;
    }

    let mut values: Vec<f64> = leads.iter().map(|&l| l as f64).collect();
    stats.mean = Some(values.iter().sum::<f64>() / values.len() as f64);
    stats.median = Some(median(&mut values));
    stats.min = leads.iter().copied().min();
    stats.max = leads.iter().copied().max();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::LifeHistory;

    fn summary(id: &str, danger: Option<i32>, collapse: Option<i32>) -> StockSummary {
        StockSummary {
            stock_id: id.to_string(),
            common_name: String::new(),
            region: String::new(),
            category: LifeHistory::Medium,
            m: 0.3,
            n_years: 10,
            max_fmi: 2.0,
            mean_fmi: 1.0,
            ever_danger: danger.is_some(),
            first_danger_year: danger,
            collapsed: collapse.is_some(),
            min_biomass_ratio: if collapse.is_some() { 0.3 } else { 0.9 },
            first_collapse_year: collapse,
        }
    }

    #[test]
    fn test_lead_time_positive_only() {
        assert_eq!(lead_time(Some(1987), Some(1992)), Some(5));
        assert_eq!(lead_time(Some(1992), Some(1992)), None);
        assert_eq!(lead_time(Some(1995), Some(1992)), None);
        assert_eq!(lead_time(None, Some(1992)), None);
        assert_eq!(lead_time(Some(1987), None), None);
    }

    #[test]
    fn test_records_and_stats() {
        let summaries = vec![
            summary("A", Some(1987), Some(1992)),
            summary("B", Some(1990), Some(1993)),
            summary("C", Some(1999), Some(1994)),
            summary("D", None, Some(1980)),
            summary("E", Some(1985), None),
            summary("F", Some(1970), Some(1980)),
        ];
        let records = lead_time_records(&summaries);
        let ids: Vec<&str> = records.iter().map(|r| r.stock_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "F"]);
        assert!(!records[2].warned_before_collapse);

        let stats = lead_time_stats(&records);
        assert_eq!(stats.candidates, 4);
        assert_eq!(stats.warned, 3);
        assert_eq!(stats.not_warned, 1);
        assert_eq!(stats.median, Some(5.0));
        assert_eq!(stats.mean, Some(6.0));
        assert_eq!(stats.min, Some(3));
        assert_eq!(stats.max, Some(10));
    }

    #[test]
    fn test_stats_without_leads() {
        let stats = lead_time_stats(&[]);
        assert_eq!(stats.candidates, 0);
        assert_eq!(stats.median, None);
    }
}
