//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let url = &config.erpnext.url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(MigrateError::Config(format!(
            "ERPNEXT_URL must start with http:// or https://, got '{}'",
            url
        )));
    }
    if config.erpnext.auth_method().is_none() {
        return Err(MigrateError::Config(
            "either ERPNEXT_PASSWORD or ERPNEXT_API_KEY/ERPNEXT_API_SECRET is required".into(),
        ));
    }
    if config.source.spreadsheet_id.trim().is_empty() {
        return Err(MigrateError::Config("SPREADSHEET_ID is required".into()));
    }

    let migration = &config.migration;
    if migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if migration.max_attempts == 0 {
        return Err(MigrateError::Config(
            "migration.max_attempts must be at least 1".into(),
        ));
    }
    if migration.request_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "migration.request_timeout_secs must be at least 1".into(),
        ));
    }
    if let Some(bad) = migration
        .retryable_statuses
        .iter()
        .find(|s| !(100..=599).contains(*s))
    {
        return Err(MigrateError::Config(format!(
            "migration.retryable_statuses contains invalid status {}",
            bad
        )));
    }

    Ok(())
}
