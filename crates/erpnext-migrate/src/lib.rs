//! # erpnext-migrate
//!
//! Idempotent batch migration of spreadsheet records into ERPNext.
//!
//! This library provides the core functionality for loading exported
//! source records into an ERPNext site with support for:
//!
//! - **Idempotent runs** - every record is checked remotely before it is created
//! - **Upsert mode** for refreshing documents that already exist
//! - **Retry with exponential backoff** on transient HTTP failures
//! - **Rate-limited batches** with a pause between them
//! - **Linked follow-up documents** such as customer billing addresses
//! - **JSON run reports** with per-record errors
//!
//! ## Example
//!
//! ```rust,no_run
//! use erpnext_migrate::mapping::CustomerMapper;
//! use erpnext_migrate::source::{JsonFileSource, RecordSource};
//! use erpnext_migrate::{Config, EngineConfig, HttpClient, MigrationEngine};
//!
//! #[tokio::main]
//! async fn main() -> erpnext_migrate::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = HttpClient::connect(&config).await?;
//!     let records = JsonFileSource::new("customers.json").read_records()?;
//!     let mapper = CustomerMapper::default();
//!     let engine = MigrationEngine::new(&client, &mapper, EngineConfig::from(&config.migration));
//!     let result = engine.run(&records).await;
//!     println!("Created {} customers", result.created);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod mapping;
pub mod normalize;
pub mod record;
pub mod report;
pub mod reset;
pub mod source;
pub mod store;

// Re-exports for convenient access
pub use client::{ErpNextClient, HttpClient};
pub use config::{Config, ErpNextConfig, MigrationConfig, SourceConfig, WriteMode};
pub use engine::{validate_records, EngineConfig, MigrationEngine, MigrationResult, Outcome, RecordError};
pub use error::{MigrateError, RequestError, Result, ValidationError};
pub use mapping::{LinkedDocument, RecordMapper};
pub use record::{Document, SourceRecord};
pub use report::MigrationReport;
pub use reset::{DoctypeResetResult, ResetPlan};
pub use store::{DocumentStore, Lookup};
