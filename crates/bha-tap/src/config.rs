//! Run configuration (`config.json`)
//!
//! The config file carries credentials, account ids and the reporting
//! window. Refreshed tokens are written back into the file as it was
//! found; no other key is added or rewritten.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::auth::{Credentials, SessionConfig, DEFAULT_TOKEN_URL};
use crate::catalog::FieldMapping;
use crate::endpoints::DEFAULT_API_BASE_URL;
use crate::error::{Result, TapError};
use crate::report::poller::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS};
use crate::report::PollSettings;
use crate::state::RunState;

/// Tap configuration file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TapConfig {
    #[serde(deserialize_with = "string_or_number")]
    pub customer_id: String,

    #[serde(deserialize_with = "string_or_number")]
    pub account_id: String,

    pub client_id: String,

    #[serde(default)]
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: String,

    #[serde(default)]
    pub developer_token: Option<String>,

    /// `YYYY-MM-DD` or an RFC 3339 timestamp
    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub end_date: Option<String>,

    /// Raw report columns to request; every catalog column when absent
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_max_poll_attempts() -> u32 {
    DEFAULT_MAX_POLL_ATTEMPTS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Parse a configured date, accepting a bare date or an RFC 3339 timestamp
pub fn parse_config_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| TapError::config(format!("invalid date '{value}'")))
}

impl TapConfig {
    /// Load and validate the config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TapError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: TapConfig = serde_json::from_str(&content)
            .map_err(|e| TapError::config(format!("failed to parse {}: {e}", path.display())))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.customer_id.is_empty() {
            return Err(TapError::config("customer_id cannot be empty"));
        }

        if self.account_id.is_empty() {
            return Err(TapError::config("account_id cannot be empty"));
        }

        if self.client_id.trim().is_empty() {
            return Err(TapError::config("client_id cannot be empty"));
        }

        if self.access_token.is_empty() && self.refresh_token.is_empty() {
            return Err(TapError::config(
                "either access_token or refresh_token must be set",
            ));
        }

        if self.max_poll_attempts == 0 {
            return Err(TapError::config("max_poll_attempts must be at least 1"));
        }

        for date in [&self.start_date, &self.end_date].into_iter().flatten() {
            parse_config_date(date)?;
        }

        if let Some(columns) = &self.columns {
            if columns.is_empty() {
                return Err(TapError::config("columns cannot be an empty list"));
            }
            let mapping = FieldMapping::hotel_performance();
            for column in columns {
                if mapping.get(column).is_none() {
                    return Err(TapError::config(format!(
                        "unknown report column '{column}'"
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.access_token, &self.refresh_token, &self.client_id)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            token_url: self.token_url.clone(),
            developer_token: self.developer_token.clone(),
            ..SessionConfig::default()
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            max_attempts: self.max_poll_attempts,
            interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    /// Resolve the run's parameters.
    ///
    /// The lower bound is the state's `start_date` when present, then the
    /// configured `start_date`, then `today`. The upper bound is the
    /// configured `end_date` or `today`.
    pub fn run_context(&self, state: Option<&RunState>, today: NaiveDate) -> Result<RunContext> {
        let start_date = match (state, &self.start_date) {
            (Some(state), _) => state.start_date,
            (None, Some(date)) => parse_config_date(date)?,
            (None, None) => today,
        };

        let end_date = match &self.end_date {
            Some(date) => parse_config_date(date)?,
            None => today,
        };

        if start_date > end_date {
            return Err(TapError::config(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }

        let columns = self
            .columns
            .clone()
            .unwrap_or_else(|| FieldMapping::hotel_performance().raw_columns());

        debug!(%start_date, %end_date, columns = columns.len(), "Resolved run context");

        Ok(RunContext {
            customer_id: self.customer_id.clone(),
            account_id: self.account_id.clone(),
            start_date,
            end_date,
            columns,
            api_base_url: self.api_base_url.clone(),
            poll: self.poll_settings(),
        })
    }

    /// Store a rotated token pair in the config file at `path`.
    ///
    /// Only the two token keys change; the file is replaced in one step.
    /// Returns `false` without touching the file when nothing changed.
    pub fn persist_credentials(
        &mut self,
        path: impl AsRef<Path>,
        credentials: &Credentials,
    ) -> Result<bool> {
        if self.access_token == credentials.access_token
            && self.refresh_token == credentials.refresh_token
        {
            return Ok(false);
        }

        let path = path.as_ref();
        let mut document: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let object = document.as_object_mut().ok_or_else(|| {
            TapError::config(format!("{} is not a JSON object", path.display()))
        })?;
        object.insert(
            "access_token".to_string(),
            Value::String(credentials.access_token.clone()),
        );
        object.insert(
            "refresh_token".to_string(),
            Value::String(credentials.refresh_token.clone()),
        );

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&document)?)?;
        std::fs::rename(&tmp, path)?;

        self.access_token = credentials.access_token.clone();
        self.refresh_token = credentials.refresh_token.clone();
        Ok(true)
    }
}

/// Immutable parameters of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub customer_id: String,
    pub account_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Raw report columns requested from the API
    pub columns: Vec<String>,
    pub api_base_url: String,
    pub poll: PollSettings,
}
