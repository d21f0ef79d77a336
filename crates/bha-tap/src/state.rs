//! Incremental checkpoint
//!
//! Accepted on input either flat (`{"start_date": "2024-01-31"}`) or wrapped
//! in a bookmark envelope keyed by stream. Always emitted flat.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::config::parse_config_date;
use crate::error::{Result, TapError};

/// Lower date bound for the next run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub start_date: NaiveDate,
}

impl RunState {
    pub fn new(start_date: NaiveDate) -> Self {
        Self { start_date }
    }

    /// Read a state file; an empty object means no checkpoint yet
    pub fn load(path: impl AsRef<Path>, stream: &str) -> Result<Option<Self>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapError::State(format!("cannot read {}: {e}", path.display())))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| TapError::State(format!("invalid JSON in {}: {e}", path.display())))?;
        Self::from_value(&value, stream)
    }

    pub fn from_value(value: &Value, stream: &str) -> Result<Option<Self>> {
        let start = value
            .get("start_date")
            .or_else(|| value.pointer(&format!("/bookmarks/{stream}/start_date")));

        match start {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(date)) => parse_config_date(date)
                .map(|d| Some(Self::new(d)))
                .map_err(|_| TapError::State(format!("invalid start_date '{date}'"))),
            Some(other) => Err(TapError::State(format!(
                "start_date must be a string, got {other}"
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "start_date": self.start_date.format("%Y-%m-%d").to_string() })
    }
}
