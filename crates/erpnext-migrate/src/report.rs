//! Persisted run reports and the console summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::engine::{truncate_for_display, MigrationResult, RecordError};
use crate::error::Result;

/// Characters of each error shown in the console summary.
const SUMMARY_ERROR_CHARS: usize = 80;

/// Report for one migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Target doctype.
    pub doctype: String,

    /// Where the records came from.
    pub source_id: String,

    /// Spreadsheet the records were exported from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,

    /// Every failed record, in input order.
    pub errors: Vec<RecordError>,

    /// Dependent documents created after their record.
    #[serde(default)]
    pub linked_created: usize,

    /// Dependent documents that failed; not counted in `failed`.
    #[serde(default)]
    pub linked_errors: Vec<RecordError>,
}

impl MigrationReport {
    /// Finalize a run result.
    pub fn from_result(
        doctype: impl Into<String>,
        source_id: impl Into<String>,
        started_at: DateTime<Utc>,
        result: MigrationResult,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Self {
            run_id: Uuid::new_v4().to_string(),
            doctype: doctype.into(),
            source_id: source_id.into(),
            spreadsheet_id: None,
            started_at,
            completed_at,
            duration_seconds,
            total: result.total,
            created: result.created,
            updated: result.updated,
            skipped: result.skipped,
            failed: result.failed,
            errors: result.errors,
            linked_created: result.linked_created,
            linked_errors: result.linked_errors,
        }
    }

    pub fn with_spreadsheet_id(mut self, spreadsheet_id: impl Into<String>) -> Self {
        self.spreadsheet_id = Some(spreadsheet_id.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// `<doctype>_migration_report_<YYYYmmdd_HHMMSS>_<run>.json`
    pub fn file_name(&self) -> String {
        let run: String = self.run_id.chars().take(8).collect();
        format!(
            "{}_migration_report_{}_{}.json",
            self.doctype.to_lowercase().replace(' ', "_"),
            self.started_at.format("%Y%m%d_%H%M%S"),
            run
        )
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report into `dir`, creating it if needed. Returns the path written.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let content = self.to_json()?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &path)?;

        info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Human-readable summary with at most `max_errors` errors listed.
    pub fn summary(&self, max_errors: usize) -> String {
        let mut out = format!(
            "{} migration complete\n  Created: {}\n  Updated: {}\n  Skipped: {}\n  Failed:  {}\n  Total:   {}\n  Duration: {:.1}s",
            self.doctype,
            self.created,
            self.updated,
            self.skipped,
            self.failed,
            self.total,
            self.duration_seconds
        );
        if self.linked_created > 0 || !self.linked_errors.is_empty() {
            out.push_str(&format!(
                "\n  Linked:  {} created, {} failed",
                self.linked_created,
                self.linked_errors.len()
            ));
        }

        if !self.errors.is_empty() && max_errors > 0 {
            out.push_str("\n\nErrors:");
            for err in self.errors.iter().take(max_errors) {
                out.push_str(&format!(
                    "\n  - {}: {}",
                    err.key,
                    truncate_for_display(&err.error, SUMMARY_ERROR_CHARS)
                ));
            }
            let hidden = self.errors.len().saturating_sub(max_errors);
            if hidden > 0 {
                out.push_str(&format!("\n  ... and {} more (see report)", hidden));
            }
        }

        if !self.linked_errors.is_empty() && max_errors > 0 {
            out.push_str("\n\nLinked document errors:");
            for err in self.linked_errors.iter().take(max_errors) {
                out.push_str(&format!(
                    "\n  - {}: {}",
                    err.key,
                    truncate_for_display(&err.error, SUMMARY_ERROR_CHARS)
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Outcome;
    use chrono::TimeZone;

    fn sample() -> MigrationReport {
        let mut result = MigrationResult::new(4);
        result.record("A", Outcome::Created);
        result.record("B", Outcome::Skipped);
        result.record("C", Outcome::Failed("HTTP 417".into()));
        result.record("D", Outcome::Failed("x".repeat(200)));
        let started = Utc.with_ymd_and_hms(2024, 11, 5, 14, 30, 0).unwrap();
        MigrationReport::from_result("Customer", "despatch.json", started, result)
    }

    #[test]
    fn test_from_result_copies_counts() {
        let report = sample();
        assert_eq!(report.total, 4);
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors.len(), 2);
        assert!(!report.is_success());
        assert!(report.duration_seconds >= 0.0);
        assert!(Uuid::parse_str(&report.run_id).is_ok());
    }

    #[test]
    fn test_file_name() {
        let report = sample();
        let name = report.file_name();
        assert!(name.starts_with("customer_migration_report_20241105_143000_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_write_to_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports");
        let report = sample();

        let path = report.write_to(&nested).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded: MigrationReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.errors, report.errors);
    }

    #[test]
    fn test_spreadsheet_id_recorded() {
        let report = sample().with_spreadsheet_id("sheet-123");
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["spreadsheet_id"], "sheet-123");
        assert_eq!(json["source_id"], "despatch.json");

        let without = serde_json::to_value(sample()).unwrap();
        assert!(without.get("spreadsheet_id").is_none());
    }

    #[test]
    fn test_linked_documents_in_report() {
        let mut result = MigrationResult::new(2);
        result.record("ABC Ltd", Outcome::Created);
        result.record("Anna", Outcome::Created);
        result.linked_created = 1;
        result.linked_errors.push(RecordError {
            key: "Anna (Address)".into(),
            error: "HTTP 417".into(),
        });
        let report = MigrationReport::from_result("Customer", "despatch.json", Utc::now(), result);

        assert!(report.is_success());
        assert_eq!(report.linked_created, 1);
        let summary = report.summary(5);
        assert!(summary.contains("Linked:  1 created, 1 failed"));
        assert!(summary.contains("Anna (Address): HTTP 417"));
    }

    #[test]
    fn test_summary_truncates_and_limits() {
        let report = sample();
        let summary = report.summary(1);
        assert!(summary.contains("Created: 1"));
        assert!(summary.contains("C: HTTP 417"));
        assert!(!summary.contains("D: "));
        assert!(summary.contains("and 1 more"));

        let full = report.summary(10);
        assert!(full.contains(&format!("D: {}...", "x".repeat(80))));
        assert!(!full.contains(&"x".repeat(81)));
    }
}
