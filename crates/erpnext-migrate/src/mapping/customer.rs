use serde_json::{json, Value};

use super::{required_text, LinkedDocument, RecordMapper};
use crate::error::ValidationError;
use crate::normalize::{clean_email, clean_phone, clean_text, is_company};
use crate::record::{Document, SourceRecord};
use crate::store::Lookup;

/// Customers from the despatch sheet, deduplicated remotely by `customer_name`.
///
/// Source fields: `customer_name`, `email` (both required), `phone`.
/// An unusable phone number is dropped rather than failing the record.
///
/// When `address` or `city` is present, a billing Address linked to the new
/// customer follows the create. `pincode` (or `postcode`) and `country` are
/// carried onto it.
#[derive(Debug, Clone)]
pub struct CustomerMapper {
    pub customer_group: String,
    pub territory: String,
    /// Address country when the record has none.
    pub default_country: String,
}

impl Default for CustomerMapper {
    fn default() -> Self {
        Self {
            customer_group: "All Customer Groups".to_string(),
            territory: "All Territories".to_string(),
            default_country: "United Kingdom".to_string(),
        }
    }
}

impl CustomerMapper {
    fn billing_address(&self, record: &SourceRecord, customer: &str) -> Option<Document> {
        let address = clean_text(&record.text("address"));
        let city = clean_text(&record.text("city"));
        if address.is_empty() && city.is_empty() {
            return None;
        }

        let line1 = if address.is_empty() { city.clone() } else { address };
        let city = if city.is_empty() { "Not specified".to_string() } else { city };
        let pincode = Some(clean_text(&record.text("pincode")))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| clean_text(&record.text("postcode")));
        let country = Some(clean_text(&record.text("country")))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.default_country.clone());

        let mut doc = Document::new();
        doc.insert("address_title".into(), Value::from(clean_text(&record.text("customer_name"))));
        doc.insert("address_type".into(), Value::from("Billing"));
        doc.insert("address_line1".into(), Value::from(line1));
        doc.insert("city".into(), Value::from(city));
        if !pincode.is_empty() {
            doc.insert("pincode".into(), Value::from(pincode));
        }
        doc.insert("country".into(), Value::from(country));

        let phone = clean_phone(&record.text("phone"));
        if !phone.is_empty() {
            doc.insert("phone".into(), Value::from(phone));
        }
        if let Some(email) = clean_email(&record.text("email")) {
            doc.insert("email_id".into(), Value::from(email));
        }
        doc.insert(
            "links".into(),
            json!([{"link_doctype": "Customer", "link_name": customer}]),
        );
        Some(doc)
    }
}

impl RecordMapper for CustomerMapper {
    fn doctype(&self) -> &str {
        "Customer"
    }

    fn natural_key(&self, record: &SourceRecord) -> String {
        clean_text(&record.text("customer_name"))
    }

    fn lookup(&self, record: &SourceRecord) -> Lookup {
        Lookup::field("customer_name", self.natural_key(record))
    }

    fn normalize(&self, record: &SourceRecord) -> Result<Document, ValidationError> {
        let name = required_text(record, "customer_name")?;
        let raw_email = required_text(record, "email")?;
        let email = clean_email(&raw_email)
            .ok_or_else(|| ValidationError::new("email", "not a valid email address"))?;

        let customer_type = if is_company(&name) { "Company" } else { "Individual" };

        let mut doc = Document::new();
        doc.insert("customer_name".into(), Value::from(name));
        doc.insert("customer_type".into(), Value::from(customer_type));
        doc.insert("customer_group".into(), Value::from(self.customer_group.clone()));
        doc.insert("territory".into(), Value::from(self.territory.clone()));
        doc.insert("email_id".into(), Value::from(email));

        let phone = clean_phone(&record.text("phone"));
        if !phone.is_empty() {
            doc.insert("mobile_no".into(), Value::from(phone));
        }

        Ok(doc)
    }

    fn linked_documents(&self, record: &SourceRecord, created_name: &str) -> Vec<LinkedDocument> {
        self.billing_address(record, created_name)
            .map(|document| LinkedDocument {
                doctype: "Address".to_string(),
                document,
            })
            .into_iter()
            .collect()
    }
}
