//! Record sources.
//!
//! Extraction from the spreadsheet itself happens elsewhere; this module reads
//! the exported rows. A JSON file may hold a single array of objects or one
//! object per line.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{MigrateError, Result};
use crate::record::SourceRecord;

/// Produces the ordered sequence of records for one run.
pub trait RecordSource {
    /// Short description of where the records came from, for reports.
    fn describe(&self) -> String;

    /// Read every record, in source order.
    fn read_records(&self) -> Result<Vec<SourceRecord>>;
}

/// Rows exported to a JSON (array) or JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_records(&self) -> Result<Vec<SourceRecord>> {
        let content = std::fs::read_to_string(&self.path)?;
        let records = parse_records(&content)?;
        info!("Read {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Parse a JSON array of objects, or JSON lines.
pub fn parse_records(content: &str) -> Result<Vec<SourceRecord>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                MigrateError::Config(format!("invalid record on line {}: {}", idx + 1, e))
            })
        })
        .collect()
}
