use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AnalysisError;

/// A documented historical collapse, used to mark charts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownCollapse {
    /// Case-insensitive substring of the stock id
    pub stock_pattern: String,
    pub collapse_year: i32,
    #[serde(default)]
    pub label: String,
}

impl KnownCollapse {
    pub fn new(stock_pattern: &str, collapse_year: i32, label: &str) -> Self {
        Self {
            stock_pattern: stock_pattern.to_string(),
            collapse_year,
            label: label.to_string(),
        }
    }

    pub fn matches(&self, stock_id: &str) -> bool {
        !self.stock_pattern.is_empty()
            && stock_id
                .to_ascii_uppercase()
                .contains(&self.stock_pattern.to_ascii_uppercase())
    }
}

/// First reference entry matching a stock
pub fn known_collapse_for<'a>(
    table: &'a [KnownCollapse],
    stock_id: &str,
) -> Option<&'a KnownCollapse> {
    table.iter().find(|entry| entry.matches(stock_id))
}

/// Load a known-collapse table from CSV with the header
/// `stock_pattern,collapse_year,label`
pub fn load_known_collapses(path: &Path) -> Result<Vec<KnownCollapse>> {
    if !path.is_file() {
        return Err(AnalysisError::MissingInput(vec![path.to_path_buf()]).into());
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open collapse table: {:?}", path))?;
    let mut entries = Vec::new();
    for (line, record) in reader.deserialize::<KnownCollapse>().enumerate() {
        let entry = record
            .with_context(|| format!("Invalid row {} in collapse table {:?}", line + 2, path))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_case_insensitive_substring() {
        let entry = KnownCollapse::new("codnf", 1992, "Northern cod");
        assert!(entry.matches("CODNF"));
        assert!(entry.matches("CODNFLD2J3KL"));
        assert!(!entry.matches("CODGB"));
        assert!(!KnownCollapse::new("", 1992, "").matches("CODNF"));
    }

    #[test]
    fn test_first_match_wins() {
        let table = vec![
            KnownCollapse::new("COD", 1990, "any cod"),
            KnownCollapse::new("CODNF", 1992, "Northern cod"),
        ];
        assert_eq!(known_collapse_for(&table, "CODNF").map(|k| k.collapse_year), Some(1990));
        assert!(known_collapse_for(&table, "HERRNS").is_none());
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collapses.csv");
        std::fs::write(
            &path,
            "stock_pattern,collapse_year,label\nCODNF,1992,Northern cod\nHERRNS,1977,\n",
        )
        .unwrap();

        let table = load_known_collapses(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0], KnownCollapse::new("CODNF", 1992, "Northern cod"));
        assert_eq!(table[1].label, "");
    }

    #[test]
    fn test_load_missing_csv_is_missing_input() {
        let err = load_known_collapses(Path::new("/nonexistent/collapses.csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::MissingInput(_))
        ));
    }
}
