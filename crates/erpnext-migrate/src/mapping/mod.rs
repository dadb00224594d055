//! Record mappers: source row in, target document out.
//!
//! A [`RecordMapper`] owns everything doctype-specific: which fields are
//! required, how they normalize, how the natural key is looked up, and which
//! dependent documents follow a successful create.

mod customer;
mod item;
mod sales_order;

pub use customer::CustomerMapper;
pub use item::{ItemMapper, VALID_ITEM_GROUPS};
pub use sales_order::SalesOrderMapper;

use crate::error::ValidationError;
use crate::record::{Document, SourceRecord};
use crate::store::Lookup;

/// Turns source records of one kind into documents of one doctype.
pub trait RecordMapper: Send + Sync {
    /// Target doctype, e.g. "Customer".
    fn doctype(&self) -> &str;

    /// Caller-meaningful identity used in logs and reports.
    fn natural_key(&self, record: &SourceRecord) -> String;

    /// How the natural key is located remotely. Defaults to the document name.
    fn lookup(&self, record: &SourceRecord) -> Lookup {
        Lookup::Name(self.natural_key(record))
    }

    /// Validate and canonicalize a record.
    fn normalize(&self, record: &SourceRecord) -> Result<Document, ValidationError>;

    /// Documents to create once the main document exists, linked to it by
    /// `created_name` (the name the remote system assigned). Only called
    /// after a fresh create, never for skipped or updated records.
    fn linked_documents(&self, _record: &SourceRecord, _created_name: &str) -> Vec<LinkedDocument> {
        Vec::new()
    }
}

/// A dependent document, such as a customer's billing address.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedDocument {
    pub doctype: String,
    pub document: Document,
}

/// Names accepted by [`builtin`].
pub const BUILTIN_MAPPERS: &[&str] = &["customer", "item", "sales_order"];

/// Look up a built-in mapper by short name.
pub fn builtin(name: &str) -> Option<Box<dyn RecordMapper>> {
    match name.to_ascii_lowercase().as_str() {
        "customer" | "customers" => Some(Box::new(CustomerMapper::default())),
        "item" | "items" => Some(Box::new(ItemMapper::default())),
        "sales_order" | "sales_orders" => Some(Box::new(SalesOrderMapper::default())),
        _ => None,
    }
}

/// Required trimmed text field.
pub(crate) fn required_text(record: &SourceRecord, field: &str) -> Result<String, ValidationError> {
    let value = crate::normalize::clean_text(&record.text(field));
    if value.is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(value)
}
