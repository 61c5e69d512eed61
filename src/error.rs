use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Source dataset not found; tried: {}", format_candidates(.0))]
    MissingInput(Vec<PathBuf>),

    #[error("Table not found in source dataset: {0}")]
    MissingTable(String),

    #[error("Column not found: {table}.{column}")]
    MissingColumn { table: String, column: String },

    #[error("Natural mortality must be positive and finite for stock {stock_id} (got {m})")]
    InvalidMortality { stock_id: String, m: f64 },

    #[error("Natural mortality must be positive and finite (got {0})")]
    NonPositiveMortality(f64),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{failed} of {total} output artifact(s) could not be written")]
    Output { failed: usize, total: usize },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

fn format_candidates(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_lists_candidates() {
        let err = AnalysisError::MissingInput(vec![
            PathBuf::from("data/ramldb.sqlite"),
            PathBuf::from("ramldb.sqlite"),
        ]);
        assert_eq!(
            err.to_string(),
            "Source dataset not found; tried: data/ramldb.sqlite, ramldb.sqlite"
        );
    }

    #[test]
    fn test_invalid_mortality_names_stock() {
        let err = AnalysisError::InvalidMortality {
            stock_id: "CODNF".to_string(),
            m: 0.0,
        };
        assert!(err.to_string().contains("CODNF"));
    }

    #[test]
    fn test_output_failure_counts() {
        let err = AnalysisError::Output {
            failed: 1,
            total: 12,
        };
        assert_eq!(err.to_string(), "1 of 12 output artifact(s) could not be written");
    }
}
