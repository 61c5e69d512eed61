//! The F/M index and the two fixed classifications built on it:
//! exploitation zones (from FMI) and life-history categories (from M).
//!
//! All bands are half-open and closed on their lower bound, so a value
//! sitting exactly on a breakpoint belongs to the band above it.
//!
//! FMI is reported and compared at nine decimal places: [`classify`] rounds
//! the quotient with [`round_fmi`], and threshold sweeps round their grid
//! the same way. Band membership is then an exact comparison.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::AnalysisError;
use crate::extract::MortalityRow;
use crate::validate::Rate;

/// Exploitation-status band derived from FMI, ordered from least to most
/// exploited
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    Safe,
    Caution,
    Warning,
    Danger,
}

impl Zone {
    pub const ALL: [Zone; 4] = [Zone::Safe, Zone::Caution, Zone::Warning, Zone::Danger];

    pub fn label(&self) -> &'static str {
        match self {
            Zone::Safe => "Safe",
            Zone::Caution => "Caution",
            Zone::Warning => "Warning",
            Zone::Danger => "Danger",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Life-history stratum derived from natural mortality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifeHistory {
    #[serde(rename = "long-lived")]
    LongLived,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "moderate turnover")]
    ModerateTurnover,
    #[serde(rename = "fast turnover")]
    FastTurnover,
}

impl LifeHistory {
    pub const ALL: [LifeHistory; 4] = [
        LifeHistory::LongLived,
        LifeHistory::Medium,
        LifeHistory::ModerateTurnover,
        LifeHistory::FastTurnover,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LifeHistory::LongLived => "long-lived",
            LifeHistory::Medium => "medium",
            LifeHistory::ModerateTurnover => "moderate turnover",
            LifeHistory::FastTurnover => "fast turnover",
        }
    }
}

impl fmt::Display for LifeHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// FMI breakpoints: lower bounds of Caution, Warning and Danger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneBreaks {
    pub caution: f64,
    pub warning: f64,
    pub danger: f64,
}

impl Default for ZoneBreaks {
    fn default() -> Self {
        Self {
            caution: 0.75,
            warning: 1.0,
            danger: 1.25,
        }
    }
}

/// Decimal places kept in FMI and in swept thresholds
pub const FMI_DECIMALS: i32 = 9;

/// Round to FMI precision. A quotient of decimal inputs meant to sit on a
/// breakpoint can land a few ulps below it (0.15 / 0.2 < 0.75); rounding
/// puts it back on the breakpoint.
pub fn round_fmi(value: f64) -> f64 {
    let scale = 10f64.powi(FMI_DECIMALS);
    (value * scale).round() / scale
}

/// `fmi >= threshold`; both sides are at FMI precision
pub fn reaches(fmi: f64, threshold: f64) -> bool {
    fmi >= threshold
}

impl ZoneBreaks {
    pub fn zone(&self, fmi: f64) -> Zone {
        if reaches(fmi, self.danger) {
            Zone::Danger
        } else if reaches(fmi, self.warning) {
            Zone::Warning
        } else if reaches(fmi, self.caution) {
            Zone::Caution
        } else {
            Zone::Safe
        }
    }

    /// Lower FMI bound of a zone (0 for Safe)
    pub fn lower_bound(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Safe => 0.0,
            Zone::Caution => self.caution,
            Zone::Warning => self.warning,
            Zone::Danger => self.danger,
        }
    }

    /// Exclusive upper FMI bound of a zone (infinite for Danger)
    pub fn upper_bound(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Safe => self.caution,
            Zone::Caution => self.warning,
            Zone::Warning => self.danger,
            Zone::Danger => f64::INFINITY,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        increasing("zone", &[self.caution, self.warning, self.danger])
    }
}

/// M breakpoints: lower bounds of Medium, ModerateTurnover and FastTurnover
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryBreaks {
    pub medium: f64,
    pub moderate: f64,
    pub fast: f64,
}

impl Default for CategoryBreaks {
    fn default() -> Self {
        Self {
            medium: 0.2,
            moderate: 0.4,
            fast: 0.8,
        }
    }
}

impl CategoryBreaks {
    pub fn category(&self, m: f64) -> LifeHistory {
        if m >= self.fast {
            LifeHistory::FastTurnover
        } else if m >= self.moderate {
            LifeHistory::ModerateTurnover
        } else if m >= self.medium {
            LifeHistory::Medium
        } else {
            LifeHistory::LongLived
        }
    }

    pub fn breakpoints(&self) -> [f64; 3] {
        [self.medium, self.moderate, self.fast]
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        increasing("life-history", &self.breakpoints())
    }
}

fn increasing(name: &str, breaks: &[f64]) -> Result<(), AnalysisError> {
    let positive = breaks.iter().all(|b| b.is_finite() && *b > 0.0);
    let ordered = breaks.windows(2).all(|w| w[0] < w[1]);
    if positive && ordered {
        Ok(())
    } else {
        Err(AnalysisError::Config(format!(
            "{} breakpoints must be positive and strictly increasing (got {:?})",
            name, breaks
        )))
    }
}

/// Compute FMI = F/M and its zone.
///
/// M is guaranteed positive by the extractor; a non-positive or non-finite
/// M here means an upstream invariant was broken and is reported as an
/// error rather than producing an infinite index.
pub fn classify(f: f64, m: f64, breaks: &ZoneBreaks) -> Result<(f64, Zone), AnalysisError> {
    if !(m.is_finite() && m > 0.0) {
        return Err(AnalysisError::NonPositiveMortality(m));
    }
    let fmi = round_fmi(f / m);
    Ok((fmi, breaks.zone(fmi)))
}

pub fn life_history_category(m: f64, breaks: &CategoryBreaks) -> LifeHistory {
    breaks.category(m)
}

/// One classified stock-year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockYearRecord {
    pub stock_id: String,
    pub year: i32,
    pub f: f64,
    pub m: f64,
    pub fmi: f64,
    pub zone: Zone,
    pub category: LifeHistory,
    pub f_family: String,
    pub f_code: String,
}

/// Classify every joined stock-year
pub fn index_records(
    rows: &[MortalityRow],
    zones: &ZoneBreaks,
    categories: &CategoryBreaks,
) -> Result<Vec<StockYearRecord>, AnalysisError> {
    rows.iter()
        .map(|row| {
            let (fmi, zone) = classify(row.f.value, row.m, zones).map_err(|_| {
                AnalysisError::InvalidMortality {
                    stock_id: row.stock_id.clone(),
                    m: row.m,
                }
            })?;
            Ok(StockYearRecord {
                stock_id: row.stock_id.clone(),
                year: row.year,
                f: row.f.value,
                m: row.m,
                fmi,
                zone,
                category: categories.category(row.m),
                f_family: row.f.family.clone(),
                f_code: row.f.metric_code.clone(),
            })
        })
        .collect()
}

/// Breach summary row: how often each zone was reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneSummaryRow {
    pub zone: Zone,
    pub stock_years: usize,
    /// Undefined when there are no stock-years at all
    pub share_of_stock_years: Rate,
    pub stocks_reached: usize,
}

pub fn zone_summary(records: &[StockYearRecord]) -> Vec<ZoneSummaryRow> {
    let mut years: BTreeMap<Zone, usize> = BTreeMap::new();
    let mut stocks: BTreeMap<Zone, BTreeSet<&str>> = BTreeMap::new();

    for record in records {
        *years.entry(record.zone).or_default() += 1;
        stocks
            .entry(record.zone)
            .or_default()
            .insert(record.stock_id.as_str());
    }

    let total = records.len();
    Zone::ALL
        .iter()
        .map(|zone| {
            let stock_years = years.get(zone).copied().unwrap_or(0);
            ZoneSummaryRow {
                zone: *zone,
                stock_years,
                share_of_stock_years: Rate::ratio(stock_years, total),
                stocks_reached: stocks.get(zone).map(|s| s.len()).unwrap_or(0),
            }
        })
        .collect()
}
