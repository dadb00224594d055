//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target system (ERPNext) connection.
    pub erpnext: ErpNextConfig,

    /// External record source (spreadsheet) identity and credentials.
    pub source: SourceConfig,

    /// Migration behavior configuration.
    pub migration: MigrationConfig,
}

/// ERPNext connection configuration.
#[derive(Clone)]
pub struct ErpNextConfig {
    /// Base URL, without trailing slash.
    pub url: String,

    /// Login username (default: "Administrator").
    pub username: String,

    /// Login password. Optional when an API key pair is configured.
    pub password: Option<String>,

    /// API key for token authentication.
    pub api_key: Option<String>,

    /// API secret for token authentication.
    pub api_secret: Option<String>,
}

/// How the client authenticates against ERPNext.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod<'a> {
    /// Static `token key:secret` header on every call.
    Token { key: &'a str, secret: &'a str },
    /// Username/password login yielding a session cookie.
    Password { username: &'a str, password: &'a str },
}

impl ErpNextConfig {
    /// Token auth wins when both halves of the key pair are present.
    pub fn auth_method(&self) -> Option<AuthMethod<'_>> {
        match (&self.api_key, &self.api_secret, &self.password) {
            (Some(key), Some(secret), _) => Some(AuthMethod::Token { key, secret }),
            (_, _, Some(password)) => Some(AuthMethod::Password {
                username: &self.username,
                password,
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for ErpNextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErpNextConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// External source configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Service account credentials for the spreadsheet API.
    pub credentials: SourceCredentials,

    /// Spreadsheet identifier; `run` records it in every migration report.
    pub spreadsheet_id: String,
}

/// Service account credentials: a file on disk or inline JSON content.
#[derive(Clone)]
pub enum SourceCredentials {
    Path(PathBuf),
    Inline(serde_json::Value),
}

impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceCredentials::Path(path) => f.debug_tuple("Path").field(path).finish(),
            SourceCredentials::Inline(_) => f.debug_tuple("Inline").field(&"[REDACTED]").finish(),
        }
    }
}

/// What to do with a record whose document already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Leave existing documents untouched and count them as skipped.
    #[default]
    SkipExisting,
    /// Overwrite existing documents with the normalized record.
    Upsert,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Records per batch before pausing (default: 50).
    pub batch_size: usize,

    /// Pause between batches in seconds (default: 1).
    pub batch_pause_secs: u64,

    /// Per-request timeout in seconds (default: 30).
    pub request_timeout_secs: u64,

    /// Total attempts per request, first try included (default: 3).
    pub max_attempts: u32,

    /// First retry delay in seconds; doubles on each further retry (default: 1).
    pub backoff_base_secs: u64,

    /// HTTP statuses treated as transient.
    pub retryable_statuses: Vec<u16>,

    /// Where reports are written. Defaults to the OS temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,

    /// Number of errors echoed in the end-of-run summary (default: 10).
    pub summary_errors: usize,

    /// Existing-document handling (default: skip_existing).
    pub write_mode: WriteMode,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_pause_secs: 1,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_secs: 1,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            report_dir: None,
            summary_errors: 10,
            write_mode: WriteMode::SkipExisting,
        }
    }
}

impl MigrationConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_pause_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    /// Resolved report directory.
    pub fn report_dir(&self) -> PathBuf {
        self.report_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
