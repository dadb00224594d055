//! Configuration loading and validation.
//!
//! Connection settings and credentials come from the environment; tuning
//! knobs can additionally be overridden from a YAML file.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use serde::Deserialize;
use std::path::Path;

pub const ENV_URL: &str = "ERPNEXT_URL";
pub const ENV_USERNAME: &str = "ERPNEXT_USERNAME";
pub const ENV_PASSWORD: &str = "ERPNEXT_PASSWORD";
pub const ENV_API_KEY: &str = "ERPNEXT_API_KEY";
pub const ENV_API_SECRET: &str = "ERPNEXT_API_SECRET";
pub const ENV_SHEETS_CREDS: &str = "GOOGLE_SHEETS_CREDS";
pub const ENV_SPREADSHEET_ID: &str = "SPREADSHEET_ID";

const DEFAULT_USERNAME: &str = "Administrator";

/// Shape of the optional YAML override file.
#[derive(Debug, Deserialize)]
struct OverrideFile {
    #[serde(default)]
    migration: MigrationConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as missing. Every missing required name is
    /// reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let url = get(ENV_URL);
        let password = get(ENV_PASSWORD);
        let api_key = get(ENV_API_KEY);
        let api_secret = get(ENV_API_SECRET);
        let creds = get(ENV_SHEETS_CREDS);
        let spreadsheet_id = get(ENV_SPREADSHEET_ID);

        let mut missing = Vec::new();
        if url.is_none() {
            missing.push(ENV_URL.to_string());
        }
        if password.is_none() && (api_key.is_none() || api_secret.is_none()) {
            missing.push(ENV_PASSWORD.to_string());
        }
        if creds.is_none() {
            missing.push(ENV_SHEETS_CREDS.to_string());
        }
        if spreadsheet_id.is_none() {
            missing.push(ENV_SPREADSHEET_ID.to_string());
        }

        let (Some(url), Some(creds), Some(spreadsheet_id)) = (url, creds, spreadsheet_id) else {
            return Err(MigrateError::MissingEnv(missing));
        };
        if !missing.is_empty() {
            return Err(MigrateError::MissingEnv(missing));
        }

        let config = Config {
            erpnext: ErpNextConfig {
                url: url.trim_end_matches('/').to_string(),
                username: get(ENV_USERNAME).unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
                password,
                api_key,
                api_secret,
            },
            source: SourceConfig {
                credentials: SourceCredentials::resolve(&creds)?,
                spreadsheet_id,
            },
            migration: MigrationConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replace the migration section with the one from a YAML file.
    pub fn with_overrides_from<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.migration = MigrationConfig::load(path)?;
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl MigrationConfig {
    /// Read the `migration:` section of a YAML override file on its own.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        parse_overrides(&content)
    }
}

fn parse_overrides(yaml: &str) -> Result<MigrationConfig> {
    if yaml.trim().is_empty() {
        return Ok(MigrationConfig::default());
    }
    let file: OverrideFile = serde_yaml::from_str(yaml)?;
    Ok(file.migration)
}

impl SourceCredentials {
    /// Interpret a raw credential setting: an existing file path, or inline
    /// JSON object content.
    pub fn resolve(raw: &str) -> Result<Self> {
        let path = Path::new(raw);
        if path.is_file() {
            return Ok(SourceCredentials::Path(path.to_path_buf()));
        }
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) if value.is_object() => Ok(SourceCredentials::Inline(value)),
            _ => Err(MigrateError::Config(format!(
                "{} must be either a valid file path or JSON content",
                ENV_SHEETS_CREDS
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_URL, "https://erp.example.com/"),
            (ENV_PASSWORD, "secret"),
            (ENV_SHEETS_CREDS, r#"{"type": "service_account"}"#),
            (ENV_SPREADSHEET_ID, "sheet-1"),
        ]
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Config::from_lookup(lookup_from(&full_env())).unwrap();
        assert_eq!(config.erpnext.url, "https://erp.example.com");
        assert_eq!(config.erpnext.username, "Administrator");
        assert_eq!(config.migration.batch_size, 50);
        assert_eq!(config.migration.max_attempts, 3);
        assert!(matches!(config.source.credentials, SourceCredentials::Inline(_)));
    }

    #[test]
    fn test_all_missing_names_reported() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        match err {
            MigrateError::MissingEnv(names) => assert_eq!(
                names,
                vec![ENV_URL, ENV_PASSWORD, ENV_SHEETS_CREDS, ENV_SPREADSHEET_ID]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut env = full_env();
        env[1] = (ENV_PASSWORD, "   ");
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(err, MigrateError::MissingEnv(ref n) if n == &vec![ENV_PASSWORD.to_string()]));
    }

    #[test]
    fn test_api_key_pair_replaces_password() {
        let env = vec![
            (ENV_URL, "https://erp.example.com"),
            (ENV_API_KEY, "key"),
            (ENV_API_SECRET, "secret"),
            (ENV_SHEETS_CREDS, r#"{"type": "service_account"}"#),
            (ENV_SPREADSHEET_ID, "sheet-1"),
        ];
        let config = Config::from_lookup(lookup_from(&env)).unwrap();
        assert!(matches!(
            config.erpnext.auth_method(),
            Some(AuthMethod::Token { key: "key", secret: "secret" })
        ));
    }

    #[test]
    fn test_unparseable_credentials() {
        let mut env = full_env();
        env[2] = (ENV_SHEETS_CREDS, "/definitely/not/a/file.json");
        let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_credentials_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let raw = file.path().to_str().unwrap();
        let creds = SourceCredentials::resolve(raw).unwrap();
        assert!(matches!(creds, SourceCredentials::Path(p) if p == file.path()));
    }

    #[test]
    fn test_yaml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "migration:").unwrap();
        writeln!(file, "  batch_size: 10").unwrap();
        writeln!(file, "  write_mode: upsert").unwrap();

        let config = Config::from_lookup(lookup_from(&full_env()))
            .unwrap()
            .with_overrides_from(file.path())
            .unwrap();
        assert_eq!(config.migration.batch_size, 10);
        assert_eq!(config.migration.write_mode, WriteMode::Upsert);
        // untouched keys keep their defaults
        assert_eq!(config.migration.request_timeout_secs, 30);
    }

    #[test]
    fn test_yaml_overrides_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "migration:").unwrap();
        writeln!(file, "  batch_size: 0").unwrap();

        let result = Config::from_lookup(lookup_from(&full_env()))
            .unwrap()
            .with_overrides_from(file.path());
        assert!(matches!(result, Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            parse_overrides("migration: [unclosed"),
            Err(MigrateError::Yaml(_))
        ));
    }
}
