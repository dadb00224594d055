//! Source records and target documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map sent to the remote system as a document body.
pub type Document = Map<String, Value>;

/// One external row: field name to raw value, in source column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecord {
    fields: Map<String, Value>,
}

impl SourceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The field rendered as text. Absent and null fields are empty.
    pub fn text(&self, field: &str) -> String {
        match self.fields.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for SourceRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for SourceRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_renders_scalars() {
        let record = SourceRecord::new()
            .with("name", "  Widget ")
            .with("price", 12.5)
            .with("qty", 3)
            .with("note", Value::Null);
        assert_eq!(record.text("name"), "  Widget ");
        assert_eq!(record.text("price"), "12.5");
        assert_eq!(record.text("qty"), "3");
        assert_eq!(record.text("note"), "");
        assert_eq!(record.text("absent"), "");
    }

    #[test]
    fn test_field_order_preserved() {
        let record: SourceRecord =
            serde_json::from_value(json!({"zeta": 1, "alpha": 2, "mid": 3})).unwrap();
        let names: Vec<&str> = record.fields().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(serde_json::from_value::<SourceRecord>(json!([1, 2])).is_err());
    }
}
