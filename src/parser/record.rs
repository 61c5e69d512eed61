use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde::Serialize;

/// A loosely typed value read from the source dataset.
///
/// Releases of the dataset disagree on column affinities (numbers stored
/// as text, years stored as reals), so rows are decoded through this
/// instead of trusting the declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }

    pub fn get(row: &Row<'_>, idx: usize) -> rusqlite::Result<Self> {
        Ok(Self::from_ref(row.get_ref(idx)?))
    }

    /// Numeric value, parsing text when needed; `None` for null, empty or
    /// non-numeric text and for non-finite numbers
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Real(f) => Some(*f),
            SqlValue::Text(s) => parse_numeric(s),
        }?;
        value.is_finite().then_some(value)
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            SqlValue::Integer(i) => i32::try_from(*i).ok(),
            SqlValue::Real(f) if f.fract() == 0.0 => Some(*f as i32),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Real(f) => Some(f.to_string()),
            SqlValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Stock metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRecord {
    pub stock_id: String,
    pub common_name: String,
    pub region: String,
    pub scientific_name: String,
}

impl StockRecord {
    /// Decode `stockid, commonname, region, scientificname`
    pub fn from_row(row: &Row<'_>) -> Result<Option<Self>> {
        let stock_id = SqlValue::get(row, 0).context("Failed to read stockid")?;
        let Some(stock_id) = stock_id.into_text() else {
            return Ok(None);
        };
        let text = |idx: usize| -> Result<String> {
            Ok(SqlValue::get(row, idx)
                .with_context(|| format!("Failed to read stock column {} for {}", idx, stock_id))?
                .into_text()
                .unwrap_or_default())
        };
        Ok(Some(Self {
            common_name: text(1)?,
            region: text(2)?,
            scientific_name: text(3)?,
            stock_id,
        }))
    }
}

/// A single annual time-series observation
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub stock_id: String,
    pub year: i32,
    pub metric_code: String,
    pub value: f64,
}

/// Outcome of decoding one time-series row
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSeriesRow {
    Point(TimeSeriesPoint),
    /// Null, non-numeric or negative value
    Rejected,
}

impl TimeSeriesRow {
    /// Decode `stockid, tsid, tsyear, tsvalue`
    pub fn from_row(row: &Row<'_>) -> Result<Self> {
        let stock_id = SqlValue::get(row, 0)?.into_text();
        let code = SqlValue::get(row, 1)?.into_text();
        let year = SqlValue::get(row, 2)?.as_year();
        let value = SqlValue::get(row, 3)?.as_f64();

        Ok(match (stock_id, code, year, value) {
            (Some(stock_id), Some(metric_code), Some(year), Some(value)) if value >= 0.0 => {
                TimeSeriesRow::Point(TimeSeriesPoint {
                    stock_id,
                    year,
                    metric_code,
                    value,
                })
            }
            _ => TimeSeriesRow::Rejected,
        })
    }
}

/// Biomass relative to its reference point, used for collapse labels
#[derive(Debug, Clone, PartialEq)]
pub struct BiomassPoint {
    pub stock_id: String,
    pub year: i32,
    pub ratio_to_reference: f64,
}
