use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A row type with a fixed column list, so a table without rows still
/// carries its header
pub trait CsvRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

/// An artifact that could not be written, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedArtifact {
    pub path: PathBuf,
    pub error: String,
}

/// Writes derived tables into one output directory, creating it on demand.
/// Existing files of the same name are replaced.
pub struct OutputWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
    failed: Vec<FailedArtifact>,
}

impl OutputWriter {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
            failed: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one CSV table, a header row followed by one line per row
    pub fn write_csv<T: CsvRow>(&mut self, file_name: &str, rows: &[T]) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("Failed to create: {:?}", path))?;
        writer
            .write_record(T::COLUMNS)
            .with_context(|| format!("Failed to write header to {:?}", path))?;
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("Failed to write row to {:?}", path))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush: {:?}", path))?;

        self.written.push(path.clone());
        Ok(path)
    }

    pub fn write_json<T: Serialize>(&mut self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        let file = File::create(&path).with_context(|| format!("Failed to create: {:?}", path))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, value)
            .with_context(|| format!("Failed to write JSON: {:?}", path))?;
        out.flush()
            .with_context(|| format!("Failed to flush: {:?}", path))?;

        self.written.push(path.clone());
        Ok(path)
    }

    /// Write one table; a failure is logged and recorded, and the caller
    /// moves on to the next artifact
    pub fn write_table<T: CsvRow>(&mut self, file_name: &str, rows: &[T]) -> Option<PathBuf> {
        let result = self.write_csv(file_name, rows);
        self.record(file_name, result)
    }

    /// Like [`write_table`](Self::write_table), for a JSON document
    pub fn write_document<T: Serialize>(&mut self, file_name: &str, value: &T) -> Option<PathBuf> {
        let result = self.write_json(file_name, value);
        self.record(file_name, result)
    }

    fn record(&mut self, file_name: &str, result: Result<PathBuf>) -> Option<PathBuf> {
        match result {
            Ok(path) => Some(path),
            Err(e) => {
                let path = self.dir.join(file_name);
                warn!(path = %path.display(), error = %format!("{:#}", e), "table failed");
                self.failed.push(FailedArtifact {
                    path,
                    error: format!("{:#}", e),
                });
                None
            }
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn failed(&self) -> &[FailedArtifact] {
        &self.failed
    }
}
