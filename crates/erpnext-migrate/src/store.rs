//! The document store seam between the migration engine and the remote system.
//!
//! [`DocumentStore`] is the only surface the engine talks to. The ERPNext
//! client implements it over HTTP; tests implement it in memory.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RequestError;
use crate::record::Document;

/// How a record's natural key is located in the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key is the document name itself (e.g. an item code).
    Name(String),
    /// The key is stored in another field (e.g. `customer_name`).
    Field { field: String, value: String },
    /// Like `Field`, but cancelled documents do not count.
    Active { field: String, value: String },
}

impl Lookup {
    pub fn field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Lookup::Field {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn active(field: impl Into<String>, value: impl Into<String>) -> Self {
        Lookup::Active {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The natural key value being looked up.
    pub fn value(&self) -> &str {
        match self {
            Lookup::Name(name) => name,
            Lookup::Field { value, .. } | Lookup::Active { value, .. } => value,
        }
    }
}

/// A document the remote system accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedDocument {
    /// Identity assigned (or confirmed) by the remote system.
    pub name: String,
    /// The stored document as echoed back.
    pub data: Value,
}

/// Existence check and writes against the target system.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the document name for a natural key.
    ///
    /// A non-success status, or a success whose body names no document,
    /// means "not found". Only transport failures are errors.
    async fn lookup(&self, doctype: &str, lookup: &Lookup) -> Result<Option<String>, RequestError>;

    /// Whether a document with this natural key exists.
    async fn exists(&self, doctype: &str, lookup: &Lookup) -> Result<bool, RequestError> {
        Ok(self.lookup(doctype, lookup).await?.is_some())
    }

    /// Create a new document.
    async fn create(&self, doctype: &str, document: &Document) -> Result<CreatedDocument, RequestError>;

    /// Overwrite an existing document.
    async fn update(
        &self,
        doctype: &str,
        name: &str,
        document: &Document,
    ) -> Result<CreatedDocument, RequestError>;
}
