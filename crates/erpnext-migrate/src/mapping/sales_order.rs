use chrono::{Days, Local, NaiveDate};
use serde_json::{Map, Value};

use super::{required_text, RecordMapper};
use crate::error::ValidationError;
use crate::normalize::{clean_int, clean_price, clean_text, parse_date};
use crate::record::{Document, SourceRecord};
use crate::store::Lookup;

/// Sales orders from the sales sheets, one record per order.
///
/// The external order number becomes `po_no`, which is how an order is found
/// again on the next run; cancelled orders do not count as existing. The
/// customer must already exist under `customer_name`.
///
/// Source fields: `order_no` (or `po_no`), `customer_name`, `order_date`,
/// `eta`, `container`, and `items`: an array of `{item_code | sku, qty, rate}`.
/// Lines without a code or with a quantity below 1 are dropped.
#[derive(Debug, Clone)]
pub struct SalesOrderMapper {
    pub company: String,
    /// Warehouse set on every order line.
    pub warehouse: String,
    /// Days after today used as the delivery date when `eta` is missing.
    pub delivery_lead_days: u64,
}

impl Default for SalesOrderMapper {
    fn default() -> Self {
        Self {
            company: "Soundbox Store".to_string(),
            warehouse: "Stores - SBS".to_string(),
            delivery_lead_days: 14,
        }
    }
}

impl SalesOrderMapper {
    fn order_lines(&self, record: &SourceRecord) -> Vec<Value> {
        let Some(Value::Array(rows)) = record.get("items") else {
            return Vec::new();
        };

        rows.iter()
            .filter_map(|row| match row {
                Value::Object(fields) => Some(SourceRecord::from(fields.clone())),
                _ => None,
            })
            .filter_map(|line| {
                let code = Some(clean_text(&line.text("item_code")))
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| clean_text(&line.text("sku")));
                let qty = clean_int(&line.text("qty"));
                if code.is_empty() || qty < 1 {
                    return None;
                }

                let mut item = Map::new();
                item.insert("item_code".into(), Value::from(code));
                item.insert("qty".into(), Value::from(qty));
                // Without a rate ERPNext falls back to the item's price list rate.
                let rate = clean_price(&line.text("rate"));
                if rate > 0.0 {
                    item.insert("rate".into(), Value::from(rate));
                }
                item.insert("warehouse".into(), Value::from(self.warehouse.clone()));
                Some(Value::Object(item))
            })
            .collect()
    }
}

impl RecordMapper for SalesOrderMapper {
    fn doctype(&self) -> &str {
        "Sales Order"
    }

    fn natural_key(&self, record: &SourceRecord) -> String {
        let order_no = clean_text(&record.text("order_no"));
        if order_no.is_empty() {
            clean_text(&record.text("po_no"))
        } else {
            order_no
        }
    }

    fn lookup(&self, record: &SourceRecord) -> Lookup {
        Lookup::active("po_no", self.natural_key(record))
    }

    fn normalize(&self, record: &SourceRecord) -> Result<Document, ValidationError> {
        let order_no = self.natural_key(record);
        if order_no.is_empty() {
            return Err(ValidationError::missing("order_no"));
        }
        let customer = required_text(record, "customer_name")?;

        let items = self.order_lines(record);
        if items.is_empty() {
            return Err(ValidationError::new("items", "no valid line items"));
        }

        let today = Local::now().date_naive();
        let transaction_date = optional_date(record, "order_date")?.unwrap_or(today);
        let delivery_date = match optional_date(record, "eta")? {
            Some(eta) => eta,
            None => today
                .checked_add_days(Days::new(self.delivery_lead_days))
                .unwrap_or(today),
        };

        let mut doc = Document::new();
        doc.insert("customer".into(), Value::from(customer));
        doc.insert("transaction_date".into(), Value::from(iso(transaction_date)));
        doc.insert("delivery_date".into(), Value::from(iso(delivery_date)));
        doc.insert("po_no".into(), Value::from(order_no));
        doc.insert("company".into(), Value::from(self.company.clone()));
        doc.insert("items".into(), Value::Array(items));

        let container = clean_text(&record.text("container"));
        if !container.is_empty() {
            doc.insert("custom_allocated_container".into(), Value::from(container));
        }

        Ok(doc)
    }
}

/// Blank is `None`; text that is present but unreadable is rejected.
fn optional_date(record: &SourceRecord, field: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let raw = clean_text(&record.text(field));
    if raw.is_empty() {
        return Ok(None);
    }
    parse_date(&raw)
        .map(Some)
        .ok_or_else(|| ValidationError::new(field, "unrecognised date"))
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
