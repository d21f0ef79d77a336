//! Report job model and submission

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::Session;
use crate::config::RunContext;
use crate::endpoints;
use crate::error::{Result, TapError};

/// Report type requested from the API
pub const REPORT_TYPE: &str = "Performance";

/// Archive format requested from the API
pub const COMPRESSION: &str = "ZIP";

/// Lifecycle of a remote report job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::InProgress => 1,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut => 2,
        }
    }

    /// Map a status string from the API.
    ///
    /// Returns `None` for strings the API is not documented to send.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "pending" | "submitted" | "queued" => Some(JobStatus::Pending),
            "inprogress" | "in_progress" | "running" => Some(JobStatus::InProgress),
            "completed" | "success" | "succeeded" => Some(JobStatus::Completed),
            "failed" | "error" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::InProgress => write!(f, "InProgress"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// A submitted report job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    pub customer_id: String,
    pub account_id: String,
    pub job_id: String,
    pub requested_columns: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    status: JobStatus,
    download_url: Option<String>,
}

impl ReportJob {
    pub fn new(ctx: &RunContext, job_id: impl Into<String>) -> Self {
        Self {
            customer_id: ctx.customer_id.clone(),
            account_id: ctx.account_id.clone(),
            job_id: job_id.into(),
            requested_columns: ctx.columns.clone(),
            start_date: ctx.start_date,
            end_date: ctx.end_date,
            status: JobStatus::Pending,
            download_url: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    /// Move to `next` unless that would regress the status.
    ///
    /// Returns whether the status changed.
    pub(crate) fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() || next.rank() < self.status.rank() || next == self.status {
            return false;
        }
        debug!(job_id = %self.job_id, from = %self.status, to = %next, "Report job status changed");
        self.status = next;
        true
    }

    pub(crate) fn complete(&mut self, download_url: Option<String>) {
        if self.advance(JobStatus::Completed) {
            self.download_url = download_url;
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitRequest<'a> {
    report_type: &'static str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    columns: &'a [String],
    compression: &'static str,
}

/// Create a report job for the run's date range and columns.
///
/// Not retried: job creation is not safe to repeat blindly.
pub async fn submit_job(session: &Session, ctx: &RunContext) -> Result<ReportJob> {
    let url = endpoints::report_jobs_url(&ctx.api_base_url, &ctx.customer_id, &ctx.account_id);

    let request = SubmitRequest {
        report_type: REPORT_TYPE,
        start_date: ctx.start_date,
        end_date: ctx.end_date,
        columns: &ctx.columns,
        compression: COMPRESSION,
    };

    info!(
        customer_id = %ctx.customer_id,
        account_id = %ctx.account_id,
        start_date = %ctx.start_date,
        end_date = %ctx.end_date,
        columns = ctx.columns.len(),
        "Submitting report job"
    );

    let response = session
        .post_json(&url, &request)
        .await
        .map_err(|e| match e {
            TapError::Http(e) => TapError::submission(e.to_string()),
            other => other,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TapError::submission(format!("{status}: {body}")));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| TapError::submission(format!("invalid response body: {e}")))?;

    let job_id = extract_job_id(&body)
        .ok_or_else(|| TapError::submission(format!("response has no job id: {body}")))?;

    info!(job_id = %job_id, "Report job submitted");
    Ok(ReportJob::new(ctx, job_id))
}

/// The API answers with an OData envelope (`value`); older deployments used
/// `ReportJobId`.
fn extract_job_id(body: &Value) -> Option<String> {
    ["value", "ReportJobId", "Id"]
        .iter()
        .find_map(|key| match body.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
}
