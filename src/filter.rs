use crate::render::ChartKind;
use anyhow::{bail, Result};

fn parse_names(names: &[String]) -> Result<Vec<ChartKind>> {
    let mut kinds = Vec::new();
    for name in names {
        let name = name.trim();
        match ChartKind::from_name(name) {
            Some(kind) => {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            None => {
                let known: Vec<&str> = ChartKind::ALL.iter().map(|k| k.name()).collect();
                bail!("Unknown chart: {} (available: {})", name, known.join(", "));
            }
        }
    }
    Ok(kinds)
}

/// Resolves which charts to render based on include/exclude filters.
/// The result is always in `ChartKind::ALL` order.
pub fn resolve_charts(
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Vec<ChartKind>> {
    match (include, exclude) {
        (Some(_), Some(_)) => {
            bail!("Cannot use both --include and --exclude at the same time");
        }
        (Some(include_list), None) => {
            let included = parse_names(&include_list)?;
            Ok(ChartKind::ALL
                .into_iter()
                .filter(|k| included.contains(k))
                .collect())
        }
        (None, Some(exclude_list)) => {
            let excluded = parse_names(&exclude_list)?;
            Ok(ChartKind::ALL
                .into_iter()
                .filter(|k| !excluded.contains(k))
                .collect())
        }
        (None, None) => Ok(ChartKind::ALL.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Option<Vec<String>> {
        Some(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_default_is_all_charts() {
        assert_eq!(resolve_charts(None, None).unwrap(), ChartKind::ALL.to_vec());
    }

    #[test]
    fn test_include_keeps_canonical_order() {
        let kinds = resolve_charts(names(&["roc_curves", "mortality_scatter"]), None).unwrap();
        assert_eq!(kinds, vec![ChartKind::MortalityScatter, ChartKind::RocCurves]);
    }

    #[test]
    fn test_exclude() {
        let kinds = resolve_charts(None, names(&["fmi_timeseries"])).unwrap();
        assert_eq!(kinds.len(), 3);
        assert!(!kinds.contains(&ChartKind::FmiTimeseries));
    }

    #[test]
    fn test_both_filters_rejected() {
        let err = resolve_charts(names(&["roc_curves"]), names(&["roc_curves"])).unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_unknown_chart_rejected() {
        let err = resolve_charts(names(&["pie_chart"]), None).unwrap_err();
        assert!(err.to_string().contains("pie_chart"));
    }
}
