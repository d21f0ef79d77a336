//! Line-delimited JSON message envelope
//!
//! Every message is serialized as one JSON object per line with a `type`
//! discriminator, which is what downstream loaders consume from stdout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single output message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// Declares the shape of the records that follow on `stream`
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },

    /// One typed row
    Record {
        stream: String,
        record: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_extracted: Option<DateTime<Utc>>,
    },

    /// Opaque checkpoint the next run is started from
    State { value: Value },
}

impl Message {
    pub fn schema(stream: impl Into<String>, schema: Value, key_properties: Vec<String>) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema,
            key_properties,
            bookmark_properties: Vec::new(),
        }
    }

    pub fn record(
        stream: impl Into<String>,
        record: Map<String, Value>,
        time_extracted: Option<DateTime<Utc>>,
    ) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted,
        }
    }

    pub fn state(value: Value) -> Self {
        Self::State { value }
    }

    /// Serialize to a single line (no trailing newline)
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Discovery output: every stream the tap can produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

/// One discoverable stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub stream: String,
    pub tap_stream_id: String,
    pub schema: Value,
    pub key_properties: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_line_shape() {
        let line = Message::state(json!({ "start_date": "2024-02-01" }))
            .to_line()
            .unwrap();
        assert_eq!(line, r#"{"type":"STATE","value":{"start_date":"2024-02-01"}}"#);
    }

    #[test]
    fn test_schema_omits_empty_bookmarks() {
        let line = Message::schema("s", json!({"type": "object"}), vec!["id".to_string()])
            .to_line()
            .unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["type"], "SCHEMA");
        assert_eq!(parsed["key_properties"], json!(["id"]));
        assert!(parsed.get("bookmark_properties").is_none());
    }

    #[test]
    fn test_record_parses_back() {
        let mut record = Map::new();
        record.insert("clicks".to_string(), json!(3));
        record.insert("cost".to_string(), Value::Null);

        let line = Message::record("s", record.clone(), None).to_line().unwrap();
        let parsed: Message = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, Message::record("s", record, None));
    }
}
