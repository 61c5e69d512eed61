use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use super::mortality::{natural_mortality, register_functions, NaturalMortality};
use crate::config::SourceConfig;
use crate::error::AnalysisError;
use crate::parser::{StockRecord, TimeSeriesPoint, TimeSeriesRow};
use crate::schema::{TableSchema, ALL_TABLES, BIOPARAMS, STOCK, TIMESERIES};

/// The source tables, as read; bioparameters arrive already aggregated to
/// one M per stock
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub stocks: Vec<StockRecord>,
    pub bioparam_rows: usize,
    pub natural_mortality: NaturalMortality,
    pub timeseries: Vec<TimeSeriesPoint>,
    /// Time-series rows dropped for a null, non-numeric or negative value
    pub timeseries_rejected: usize,
}

/// Read-only access to the source dataset
pub struct SourceReader {
    conn: Connection,
}

impl SourceReader {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open source dataset: {:?}", path))?;
        register_functions(&conn)
            .with_context(|| format!("Failed to prepare source dataset: {:?}", path))?;

        Ok(Self { conn })
    }

    /// Check that every required table and column exists
    pub fn verify_schema(&self) -> Result<(), AnalysisError> {
        for schema in ALL_TABLES {
            let present = self.table_columns(schema.name)?;
            if present.is_empty() {
                return Err(AnalysisError::MissingTable(schema.name.to_string()));
            }
            if let Some(missing) = schema
                .columns
                .iter()
                .find(|col| !present.contains(&col.name.to_ascii_lowercase()))
            {
                return Err(AnalysisError::MissingColumn {
                    table: schema.name.to_string(),
                    column: missing.name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn table_columns(&self, table: &str) -> Result<HashSet<String>, AnalysisError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .map(|name| name.map(|n| n.to_ascii_lowercase()))
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(names)
    }

    pub fn read_stocks(&self) -> Result<Vec<StockRecord>> {
        let mut stocks = Vec::new();
        let mut stmt = self.conn.prepare(&select_sql(&STOCK, &["stockid"]))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if let Some(stock) = StockRecord::from_row(row)? {
                stocks.push(stock);
            }
        }
        Ok(stocks)
    }

    fn count_rows(&self, schema: &TableSchema) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", schema.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Per-stock M, filtered, aggregated and joined onto `stock` in SQL
    pub fn natural_mortality(&self, source: &SourceConfig) -> Result<NaturalMortality> {
        natural_mortality(&self.conn, source)
    }

    /// Read all time-series rows; returns the accepted points and the number
    /// of rejected rows
    pub fn read_timeseries(&self) -> Result<(Vec<TimeSeriesPoint>, usize)> {
        let mut points = Vec::new();
        let mut rejected = 0usize;
        let mut stmt = self.conn.prepare(&select_sql(
            &TIMESERIES,
            &["stockid", "tsyear", "tsid", "tsvalue"],
        ))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            match TimeSeriesRow::from_row(row)
                .with_context(|| format!("Failed to decode row in {}", TIMESERIES.name))?
            {
                TimeSeriesRow::Point(point) => points.push(point),
                TimeSeriesRow::Rejected => rejected += 1,
            }
        }
        Ok((points, rejected))
    }

    /// Verify the schema and read all three tables
    pub fn load(&self, source: &SourceConfig) -> Result<SourceTables> {
        self.verify_schema()?;

        let stocks = self.read_stocks().context("Failed to read stock table")?;
        debug!(rows = stocks.len(), "read stock table");
        let bioparam_rows = self
            .count_rows(&BIOPARAMS)
            .context("Failed to read bioparams table")?;
        let natural_mortality = self
            .natural_mortality(source)
            .context("Failed to aggregate natural mortality")?;
        debug!(
            rows = bioparam_rows,
            stocks = natural_mortality.by_stock.len(),
            "read bioparams table"
        );
        let (timeseries, timeseries_rejected) = self
            .read_timeseries()
            .context("Failed to read timeseries table")?;
        debug!(
            rows = timeseries.len(),
            rejected = timeseries_rejected,
            "read timeseries table"
        );

        Ok(SourceTables {
            stocks,
            bioparam_rows,
            natural_mortality,
            timeseries,
            timeseries_rejected,
        })
    }
}

/// SELECT of the schema's columns in declaration order, with a total order
/// so repeated runs see rows identically
fn select_sql(schema: &TableSchema, order_by: &[&str]) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        schema.column_names().join(", "),
        schema.name,
        order_by.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_dataset(path: &Path, tables: &[&TableSchema]) {
        let conn = Connection::open(path).unwrap();
        for schema in tables {
            conn.execute(&schema.create_table_sql(), []).unwrap();
        }
    }

    #[test]
    fn test_select_sql_orders_rows() {
        assert_eq!(
            select_sql(&TIMESERIES, &["stockid", "tsyear"]),
            "SELECT stockid, tsid, tsyear, tsvalue FROM timeseries ORDER BY stockid, tsyear"
        );
    }

    #[test]
    fn test_missing_table_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.sqlite");
        create_dataset(&path, &[&STOCK, &BIOPARAMS]);

        let reader = SourceReader::open(&path).unwrap();
        match reader.verify_schema() {
            Err(AnalysisError::MissingTable(name)) => assert_eq!(name, "timeseries"),
            other => panic!("expected missing table, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("columns.sqlite");
        create_dataset(&path, &[&STOCK, &BIOPARAMS]);
        Connection::open(&path)
            .unwrap()
            .execute(
                "CREATE TABLE timeseries (stockid TEXT, tsid TEXT, tsyear INTEGER)",
                [],
            )
            .unwrap();

        let reader = SourceReader::open(&path).unwrap();
        let err = reader.verify_schema().unwrap_err();
        assert_eq!(err.to_string(), "Column not found: timeseries.tsvalue");
    }

    #[test]
    fn test_load_reads_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.sqlite");
        create_dataset(&path, ALL_TABLES);
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "INSERT INTO stock VALUES ('B', 'haddock', 'North Sea', 'Melanogrammus aeglefinus');
             INSERT INTO stock VALUES ('A', 'cod', 'Atlantic', 'Gadus morhua');
             INSERT INTO bioparams VALUES ('A', 'M-1/T', '0.2');
             INSERT INTO timeseries VALUES ('A', 'F-1/T', 2001, 0.3);
             INSERT INTO timeseries VALUES ('A', 'F-1/T', 2000, 0.2);
             INSERT INTO timeseries VALUES ('A', 'F-1/T', 2002, NULL);",
        )
        .unwrap();
        drop(conn);

        let tables = SourceReader::open(&path)
            .unwrap()
            .load(&SourceConfig::default())
            .unwrap();
        assert_eq!(tables.stocks.len(), 2);
        assert_eq!(tables.stocks[0].stock_id, "A");
        assert_eq!(tables.bioparam_rows, 1);
        assert_eq!(tables.natural_mortality.by_stock["A"].m, 0.2);
        assert_eq!(tables.timeseries.len(), 2);
        assert_eq!(tables.timeseries[0].year, 2000);
        assert_eq!(tables.timeseries_rejected, 1);
    }
}
