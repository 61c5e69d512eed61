use std::path::{Path, PathBuf};

use crate::error::AnalysisError;

/// Pick the first candidate path that exists as a file.
///
/// The dataset is static, so a miss is fatal: the error lists every path
/// that was tried.
pub fn resolve_source(candidates: &[PathBuf]) -> Result<PathBuf, AnalysisError> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| AnalysisError::MissingInput(candidates.to_vec()))
}

/// Candidate list with an explicit path tried first
pub fn candidates_with_override(
    override_path: Option<&Path>,
    defaults: &[PathBuf],
) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(defaults.len() + 1);
    if let Some(path) = override_path {
        candidates.push(path.to_path_buf());
    }
    candidates.extend(defaults.iter().filter(|p| Some(p.as_path()) != override_path).cloned());
    candidates
}
