//! Table schema definitions for the stock-assessment source dataset

use super::types::*;

/// Stock metadata, one row per stock
pub static STOCK: TableSchema = TableSchema {
    name: "stock",
    columns: &[
        Column::required("stockid", ColumnType::Text),
        Column::new("commonname", ColumnType::Text),
        Column::new("region", ColumnType::Text),
        Column::new("scientificname", ColumnType::Text),
    ],
    key_column: "stockid",
};

/// Biological parameters; `biovalue` is free text in most releases
pub static BIOPARAMS: TableSchema = TableSchema {
    name: "bioparams",
    columns: &[
        Column::required("stockid", ColumnType::Text),
        Column::required("bioid", ColumnType::Text),
        Column::new("biovalue", ColumnType::Text),
    ],
    key_column: "stockid",
};

/// Annual time series of every reported metric
pub static TIMESERIES: TableSchema = TableSchema {
    name: "timeseries",
    columns: &[
        Column::required("stockid", ColumnType::Text),
        Column::required("tsid", ColumnType::Text),
        Column::required("tsyear", ColumnType::Integer),
        Column::new("tsvalue", ColumnType::Real),
    ],
    key_column: "stockid",
};

pub static ALL_TABLES: &[&TableSchema] = &[&STOCK, &BIOPARAMS, &TIMESERIES];
