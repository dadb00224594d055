use serde_json::Value;

use super::{required_text, RecordMapper};
use crate::error::ValidationError;
use crate::normalize::{clean_float, clean_price, clean_text, truncate_chars};
use crate::record::{Document, SourceRecord};

/// Item groups that exist on the target site.
pub const VALID_ITEM_GROUPS: &[&str] = &[
    "Booth",
    "Acoustic Panel",
    "Acoustic Slat",
    "Furniture",
    "Accessory",
    "Moss",
    "Spare Glass",
    "Spare Packaging",
];

const MAX_ITEM_NAME_CHARS: usize = 140;

/// Products from the master file, keyed by `item_code` (the document name).
///
/// Source fields: `item_code`, `item_name` (both required), `description`,
/// `item_group`, `valuation_rate`, `standard_rate`, `weight`.
#[derive(Debug, Clone)]
pub struct ItemMapper {
    pub default_group: String,
    pub stock_uom: String,
}

impl Default for ItemMapper {
    fn default() -> Self {
        Self {
            default_group: "Booth".to_string(),
            stock_uom: "Nos".to_string(),
        }
    }
}

impl RecordMapper for ItemMapper {
    fn doctype(&self) -> &str {
        "Item"
    }

    fn natural_key(&self, record: &SourceRecord) -> String {
        clean_text(&record.text("item_code"))
    }

    fn normalize(&self, record: &SourceRecord) -> Result<Document, ValidationError> {
        let code = required_text(record, "item_code")?;
        let name = required_text(record, "item_name")?;

        let group = clean_text(&record.text("item_group"));
        let group = if VALID_ITEM_GROUPS.contains(&group.as_str()) {
            group
        } else {
            self.default_group.clone()
        };

        let mut doc = Document::new();
        doc.insert("item_code".into(), Value::from(code));
        doc.insert("item_name".into(), Value::from(truncate_chars(&name, MAX_ITEM_NAME_CHARS)));
        doc.insert("description".into(), Value::from(clean_text(&record.text("description"))));
        doc.insert("item_group".into(), Value::from(group));
        doc.insert("stock_uom".into(), Value::from(self.stock_uom.clone()));
        doc.insert("is_stock_item".into(), Value::from(1));
        doc.insert("include_item_in_manufacturing".into(), Value::from(0));
        doc.insert("valuation_rate".into(), Value::from(clean_price(&record.text("valuation_rate"))));
        doc.insert("standard_rate".into(), Value::from(clean_price(&record.text("standard_rate"))));

        let weight = clean_float(&record.text("weight"));
        if weight > 0.0 {
            doc.insert("weight_per_unit".into(), Value::from(weight));
            doc.insert("weight_uom".into(), Value::from("Kg"));
        }

        Ok(doc)
    }
}
