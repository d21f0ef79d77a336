//! Message stream writer

use bha_common::Message;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::io::Write;
use tracing::debug;

use crate::error::Result;
use crate::schema::OutputSchema;
use crate::state::RunState;

/// Name of the only stream this tap emits
pub const STREAM_NAME: &str = "hotel_performance_report";

const PROGRESS_EVERY: u64 = 10_000;

/// Writes SCHEMA, RECORD and STATE lines to `W`
pub struct MessageWriter<W: Write> {
    out: W,
    stream: String,
    records_written: u64,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stream: STREAM_NAME.to_string(),
            records_written: 0,
        }
    }

    pub fn write_schema(&mut self, schema: &OutputSchema) -> Result<()> {
        let message = Message::schema(
            &self.stream,
            schema.to_json_schema(),
            schema.key_fields().to_vec(),
        );
        self.write_message(&message)
    }

    pub fn write_record(
        &mut self,
        record: Map<String, Value>,
        time_extracted: DateTime<Utc>,
    ) -> Result<()> {
        let message = Message::record(&self.stream, record, Some(time_extracted));
        self.write_message(&message)?;

        self.records_written += 1;
        if self.records_written % PROGRESS_EVERY == 0 {
            debug!(records = self.records_written, "Records emitted");
        }
        Ok(())
    }

    /// Write the checkpoint and flush
    pub fn write_state(&mut self, state: &RunState) -> Result<()> {
        self.write_message(&Message::state(state.to_value()))?;
        self.flush()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_message(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldMapping;
    use crate::schema::infer_schema;
    use chrono::NaiveDate;
    use serde_json::json;

    fn lines(bytes: Vec<u8>) -> Vec<Value> {
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_message_sequence() {
        let mapping = FieldMapping::hotel_performance();
        let header = vec!["HotelId".to_string(), "Clicks".to_string()];
        let schema = infer_schema(&header, mapping, &mapping.key_fields());

        let mut writer = MessageWriter::new(Vec::new());
        writer.write_schema(&schema).unwrap();

        let mut record = Map::new();
        record.insert("hotel_id".into(), json!("42"));
        record.insert("clicks".into(), json!(7));
        writer.write_record(record, Utc::now()).unwrap();
        writer
            .write_state(&RunState::new(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()))
            .unwrap();
        assert_eq!(writer.records_written(), 1);

        let out = lines(writer.into_inner());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["type"], "SCHEMA");
        assert_eq!(out[0]["stream"], STREAM_NAME);
        assert_eq!(out[0]["key_properties"], json!(["hotel_id"]));
        assert_eq!(out[1]["type"], "RECORD");
        assert_eq!(out[1]["record"], json!({"hotel_id": "42", "clicks": 7}));
        assert!(out[1]["time_extracted"].is_string());
        assert_eq!(out[2], json!({"type": "STATE", "value": {"start_date": "2024-01-31"}}));
    }
}
