//! Error types for the tap
//!
//! `Auth`, `Submission`, `Download` and `ReportFailed` abort the run. Polling
//! outcomes that end a run early without data (`TimedOut`, `ReadyEmpty`) are
//! not errors; see [`crate::report::PollOutcome`].

use thiserror::Error;

/// Result type alias for tap operations
pub type Result<T> = std::result::Result<T, TapError>;

/// Main error type for the tap
#[derive(Error, Debug)]
pub enum TapError {
    /// Token refresh failed; the triggering request is not retried
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Report job creation rejected or answered without a job id
    #[error("Report submission failed: {0}")]
    Submission(String),

    /// Report archive could not be fetched
    #[error("Report download failed: {0}")]
    Download(String),

    /// The remote job reached a failed state
    #[error("Report job {job_id} failed on the server")]
    ReportFailed { job_id: String },

    /// A status request returned a non-success response
    #[error("Report status request failed: {0}")]
    Status(String),

    /// Archive did not have the documented layout
    #[error("Malformed report archive: {0}")]
    Archive(String),

    /// A cell could not be coerced to its catalog type
    #[error("Cannot convert column '{column}' value '{value}': {reason}")]
    Transform {
        column: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State error: {0}")]
    State(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TapError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transform(
        column: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Transform {
            column: column.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
