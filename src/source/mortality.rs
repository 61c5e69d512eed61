//! Natural mortality per stock, aggregated in the source dataset
//!
//! Bioparameter values are free text in most releases, so the connection
//! carries a `numeric_value()` function that decodes cells the same way
//! [`SqlValue`] does. The prefix filter, the range filter, the per-stock
//! mean and the join onto `stock` run as prepared statements. SQLite has
//! no median aggregate, so that option takes the filtered rows and
//! aggregates them here.

use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{MAggregation, SourceConfig};
use crate::extract::median;
use crate::parser::{SqlValue, StockRecord};

/// M for one stock that also has a metadata row
#[derive(Debug, Clone, PartialEq)]
pub struct StockMortality {
    pub stock: StockRecord,
    pub m: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NaturalMortality {
    pub by_stock: BTreeMap<String, StockMortality>,
    /// Rows whose code matched the natural-mortality prefix
    pub matched_rows: usize,
    pub non_numeric: usize,
    pub out_of_range: usize,
    /// Stocks with at least one in-range row, with or without metadata
    pub stocks_with_m: usize,
}

/// Register the scalar functions the mortality queries rely on
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "numeric_value",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(SqlValue::from_ref(ctx.get_raw(0)).as_f64()),
    )
}

/// Rows whose code starts with ?1, with the decoded value as `m`
const MATCHED_ROWS: &str = "SELECT trim(stockid) AS stockid, numeric_value(biovalue) AS m
    FROM bioparams
    WHERE trim(stockid) <> '' AND substr(bioid, 1, length(?1)) = ?1";

fn counts_sql() -> String {
    format!(
        "SELECT COUNT(*),
                COALESCE(SUM(m IS NULL), 0),
                COALESCE(SUM(m <= ?2 OR m >= ?3), 0),
                COUNT(DISTINCT CASE WHEN m > ?2 AND m < ?3 THEN stockid END)
         FROM ({})",
        MATCHED_ROWS
    )
}

/// In-range rows joined onto their stock; `value` is either `AVG(b.m)`
/// with a grouping or the bare `b.m`
fn joined_sql(value: &str, group_by: &str, order_by: &str) -> String {
    format!(
        "SELECT s.stockid, s.commonname, s.region, s.scientificname, {}
         FROM ({}) b
         JOIN stock s ON trim(s.stockid) = b.stockid
         WHERE b.m > ?2 AND b.m < ?3
         {}
         ORDER BY {}",
        value, MATCHED_ROWS, group_by, order_by
    )
}

/// One M per stock from the qualifying bioparameter rows.
///
/// Rows are kept when the code starts with the natural-mortality prefix and
/// the value lies strictly inside `(m_min, m_max)`. A stock with no
/// qualifying rows, or no metadata row, gets no entry at all.
pub fn natural_mortality(conn: &Connection, source: &SourceConfig) -> Result<NaturalMortality> {
    let bounds = params![source.natural_mortality_prefix, source.m_min, source.m_max];

    let (matched, non_numeric, out_of_range, with_m) = conn
        .query_row(&counts_sql(), bounds, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .context("Failed to count natural mortality rows")?;

    let mut result = NaturalMortality {
        matched_rows: matched as usize,
        non_numeric: non_numeric as usize,
        out_of_range: out_of_range as usize,
        stocks_with_m: with_m as usize,
        ..Default::default()
    };
    debug!(
        matched = result.matched_rows,
        non_numeric = result.non_numeric,
        out_of_range = result.out_of_range,
        "natural mortality rows"
    );

    match source.m_aggregation {
        MAggregation::Mean => {
            let sql = joined_sql("AVG(b.m)", "GROUP BY b.stockid", "b.stockid");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(bounds)?;
            while let Some(row) = rows.next()? {
                let Some(stock) = StockRecord::from_row(row)? else {
                    continue;
                };
                let m: f64 = row.get(4)?;
                result
                    .by_stock
                    .insert(stock.stock_id.clone(), StockMortality { stock, m });
            }
        }
        MAggregation::Median => {
            let mut values: BTreeMap<String, (StockRecord, Vec<f64>)> = BTreeMap::new();
            let sql = joined_sql("b.m", "", "b.stockid, b.m");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(bounds)?;
            while let Some(row) = rows.next()? {
                let Some(stock) = StockRecord::from_row(row)? else {
                    continue;
                };
                let m: f64 = row.get(4)?;
                values
                    .entry(stock.stock_id.clone())
                    .or_insert_with(|| (stock, Vec::new()))
                    .1
                    .push(m);
            }
            result.by_stock = values
                .into_iter()
                .map(|(stock_id, (stock, mut v))| {
                    let m = median(&mut v);
                    (stock_id, StockMortality { stock, m })
                })
                .collect();
        }
    }

    Ok(result)
}
