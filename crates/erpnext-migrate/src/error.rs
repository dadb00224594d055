//! Error types for the migration library.
//!
//! Two layers live here. [`MigrateError`] covers failures that abort a run
//! before any record is processed (configuration, authentication) plus the
//! usual IO/serialization plumbing. The per-request types ([`TransportError`],
//! [`ApiError`], [`RequestError`]) and [`ValidationError`] describe failures of
//! a single record; the engine records them and keeps going.

use thiserror::Error;

/// Process exit code for a run that finished with failed records.
pub const EXIT_RECORD_FAILURES: u8 = 1;
/// Process exit code for missing or invalid configuration.
pub const EXIT_CONFIG_ERROR: u8 = 2;
/// Process exit code for a rejected login.
pub const EXIT_AUTH_ERROR: u8 = 3;
/// Process exit code for a request failure outside the per-record loop.
pub const EXIT_REQUEST_ERROR: u8 = 4;
/// Process exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, bad values, unreadable credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required environment variables are absent
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// Login or token verification rejected by the remote system
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A request failed outside the per-record loop (reset, listing)
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        MigrateError::Config(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::MissingEnv(_)
            | MigrateError::Yaml(_)
            | MigrateError::Json(_) => EXIT_CONFIG_ERROR,
            MigrateError::Auth(_) => EXIT_AUTH_ERROR,
            MigrateError::Request(_) => EXIT_REQUEST_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        if let MigrateError::MissingEnv(names) = self {
            output.push_str("\nRequired environment variables:\n");
            for name in names {
                output.push_str(&format!("  {}\n", name));
            }
        }

        output
    }
}

/// Failure below the HTTP layer: nothing usable came back from the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request exceeded the configured timeout.
    #[error("Timeout")]
    Timeout,

    /// Connection-level failure; `kind` is a short type label, never a message.
    #[error("NetworkError:{kind}")]
    Connection { kind: String },
}

impl TransportError {
    pub fn connection(kind: impl Into<String>) -> Self {
        TransportError::Connection { kind: kind.into() }
    }
}

/// The server answered, but not with what the operation expects.
///
/// None of the variants carry response text: bodies may echo secrets back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("MalformedResponse")]
    MalformedResponse,

    /// Success status, but the `data.name` identity field was absent.
    #[error("MissingIdentity")]
    MissingIdentity,
}

/// Either half of a failed request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl RequestError {
    /// Short sanitized classification recorded against a failed record.
    pub fn classify(&self) -> String {
        self.to_string()
    }

    /// Whether the failure is a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Transport(TransportError::Timeout))
    }
}

/// A required field was missing or could not be normalized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed for '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required value is missing")
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_timeout() {
        let err = RequestError::from(TransportError::Timeout);
        assert_eq!(err.classify(), "Timeout");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_classify_network_error() {
        let err = RequestError::from(TransportError::connection("Connect"));
        assert_eq!(err.classify(), "NetworkError:Connect");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_classify_api_errors() {
        assert_eq!(RequestError::from(ApiError::HttpStatus(417)).classify(), "HTTP 417");
        assert_eq!(
            RequestError::from(ApiError::MalformedResponse).classify(),
            "MalformedResponse"
        );
        assert_eq!(
            RequestError::from(ApiError::MissingIdentity).classify(),
            "MissingIdentity"
        );
    }

    #[test]
    fn test_missing_env_lists_names() {
        let err = MigrateError::MissingEnv(vec!["ERPNEXT_URL".into(), "SPREADSHEET_ID".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: ERPNEXT_URL, SPREADSHEET_ID"
        );
        let detailed = err.format_detailed();
        assert!(detailed.contains("  ERPNEXT_URL\n"));
        assert_eq!(err.exit_code(), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Auth("status 401".into()).exit_code(), EXIT_AUTH_ERROR);
        assert_eq!(
            MigrateError::Request(ApiError::HttpStatus(500).into()).exit_code(),
            EXIT_REQUEST_ERROR
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(MigrateError::from(io).exit_code(), EXIT_IO_ERROR);
        assert_eq!(MigrateError::config("bad").exit_code(), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_validation_message() {
        let err = ValidationError::missing("email");
        assert_eq!(
            err.to_string(),
            "Validation failed for 'email': required value is missing"
        );
    }
}
