//! Batch migration engine - drives records through normalize, existence
//! check, and create, one at a time.
//!
//! The remote system is the only record of what has been migrated: every
//! record is checked for existence right before it is written, so an
//! interrupted run can simply be started again.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{MigrationConfig, WriteMode};
use crate::mapping::RecordMapper;
use crate::record::SourceRecord;
use crate::store::DocumentStore;

/// Engine settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Records per batch before pausing.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_pause: Duration,
    /// Existing-document handling.
    pub write_mode: WriteMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&MigrationConfig::default())
    }
}

impl From<&MigrationConfig> for EngineConfig {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause(),
            write_mode: config.write_mode,
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
    /// Sanitized failure classification.
    Failed(String),
}

/// A failed record and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub key: String,
    pub error: String,
}

/// Accumulated counts and errors for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Records in the input sequence.
    pub total: usize,
    pub created: usize,
    /// Existing documents overwritten (upsert mode only).
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Inter-batch pauses taken.
    pub pauses: usize,
    /// Failed records in input order.
    pub errors: Vec<RecordError>,
    /// Dependent documents (such as addresses) created after their record.
    #[serde(default)]
    pub linked_created: usize,
    /// Dependent documents that could not be created. Their record still
    /// counts as created.
    #[serde(default)]
    pub linked_errors: Vec<RecordError>,
}

impl MigrationResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Apply one record's outcome.
    pub fn record(&mut self, key: impl Into<String>, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(error) => {
                self.failed += 1;
                self.errors.push(RecordError {
                    key: key.into(),
                    error,
                });
            }
        }
    }

    /// Records with an outcome so far.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Sequential, idempotent migration of records into one doctype.
pub struct MigrationEngine<'a> {
    store: &'a dyn DocumentStore,
    mapper: &'a dyn RecordMapper,
    config: EngineConfig,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(store: &'a dyn DocumentStore, mapper: &'a dyn RecordMapper, config: EngineConfig) -> Self {
        Self {
            store,
            mapper,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process every record exactly once, in order.
    ///
    /// Per-record failures are recorded, never returned; the run always
    /// reaches the end of the input.
    pub async fn run(&self, records: &[SourceRecord]) -> MigrationResult {
        let span = info_span!("migration", doctype = %self.mapper.doctype(), total = records.len());
        self.run_records(records).instrument(span).await
    }

    async fn run_records(&self, records: &[SourceRecord]) -> MigrationResult {
        let total = records.len();
        let doctype = self.mapper.doctype();
        let batch_size = self.config.batch_size.max(1);
        let mut result = MigrationResult::new(total);

        info!(
            "Migrating {} {} records (batch size {}, mode {:?})",
            total, doctype, batch_size, self.config.write_mode
        );

        for (idx, record) in records.iter().enumerate() {
            let position = idx + 1;
            let key = record_key(self.mapper, record, position);
            let outcome = self.process(doctype, record, &key, &mut result).await;

            match &outcome {
                Outcome::Created => info!("[{}/{}] Created: {}", position, total, key),
                Outcome::Updated => info!("[{}/{}] Updated: {}", position, total, key),
                Outcome::Skipped => info!("[{}/{}] Skipping (exists): {}", position, total, key),
                Outcome::Failed(error) => warn!(
                    "[{}/{}] Failed: {} - {}",
                    position,
                    total,
                    key,
                    truncate_for_display(error, 100)
                ),
            }
            result.record(key, outcome);

            if position % batch_size == 0 && position < total {
                info!("Processed {}/{} records, pausing...", position, total);
                result.pauses += 1;
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        info!(
            "{} migration finished: {} created, {} updated, {} skipped, {} failed",
            doctype, result.created, result.updated, result.skipped, result.failed
        );
        if result.linked_created > 0 || !result.linked_errors.is_empty() {
            info!(
                "Linked documents: {} created, {} failed",
                result.linked_created,
                result.linked_errors.len()
            );
        }
        result
    }

    /// normalize -> existence check -> write. The order is fixed: invalid
    /// records never reach the network, and nothing is written without a
    /// fresh existence check. Linked documents follow a fresh create and are
    /// tallied on `result` directly.
    async fn process(
        &self,
        doctype: &str,
        record: &SourceRecord,
        key: &str,
        result: &mut MigrationResult,
    ) -> Outcome {
        let document = match self.mapper.normalize(record) {
            Ok(document) => document,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        let lookup = self.mapper.lookup(record);

        match self.config.write_mode {
            WriteMode::SkipExisting => match self.store.exists(doctype, &lookup).await {
                Ok(true) => return Outcome::Skipped,
                Ok(false) => {}
                Err(e) => return Outcome::Failed(e.classify()),
            },
            WriteMode::Upsert => match self.store.lookup(doctype, &lookup).await {
                Ok(Some(name)) => {
                    debug!("{} {} exists as {}, updating", doctype, lookup.value(), name);
                    return match self.store.update(doctype, &name, &document).await {
                        Ok(_) => Outcome::Updated,
                        Err(e) => Outcome::Failed(format!("Update failed: {}", e.classify())),
                    };
                }
                Ok(None) => {}
                Err(e) => return Outcome::Failed(e.classify()),
            },
        }

        match self.store.create(doctype, &document).await {
            Ok(created) => {
                debug!("{} created as {}", doctype, created.name);
                self.create_linked(record, key, &created.name, result).await;
                Outcome::Created
            }
            Err(e) => Outcome::Failed(e.classify()),
        }
    }

    async fn create_linked(
        &self,
        record: &SourceRecord,
        key: &str,
        created_name: &str,
        result: &mut MigrationResult,
    ) {
        for linked in self.mapper.linked_documents(record, created_name) {
            match self.store.create(&linked.doctype, &linked.document).await {
                Ok(created) => {
                    debug!("{} {} linked to {}", linked.doctype, created.name, created_name);
                    result.linked_created += 1;
                }
                Err(e) => {
                    let error = e.classify();
                    warn!("{} for {} not created: {}", linked.doctype, key, error);
                    result.linked_errors.push(RecordError {
                        key: format!("{} ({})", key, linked.doctype),
                        error,
                    });
                }
            }
        }
    }
}

/// Offline check: normalize every record without touching the network.
pub fn validate_records(mapper: &dyn RecordMapper, records: &[SourceRecord]) -> Vec<RecordError> {
    records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            mapper.normalize(record).err().map(|e| RecordError {
                key: record_key(mapper, record, idx + 1),
                error: e.to_string(),
            })
        })
        .collect()
}

/// Natural key, or the row position when the key itself is blank.
fn record_key(mapper: &dyn RecordMapper, record: &SourceRecord, position: usize) -> String {
    let key = mapper.natural_key(record);
    if key.is_empty() {
        format!("row {}", position)
    } else {
        key
    }
}

/// Shorten text for console output.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max_chars).collect();
        short.push_str("...");
        short
    }
}
