//! Fixed-interval polling of a report job
//!
//! The API has no completion callback, so the job is polled at a fixed
//! interval with a hard attempt ceiling. The wait between attempts goes
//! through [`Sleeper`] so tests can run the loop without real delay.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::endpoints;
use crate::error::{Result, TapError};
use crate::report::job::{JobStatus, ReportJob};

/// Default maximum number of status requests
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 120;

/// Default wait between status requests
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Result of polling a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Report is ready at the given URL
    Ready(String),
    /// Job completed without producing a file (no rows)
    ReadyEmpty,
    /// Job did not complete within the attempt ceiling
    TimedOut,
}

/// Polling bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

/// Suspends the poll loop between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatusResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
}

/// Poll `job` until it completes or `settings.max_attempts` requests were made.
///
/// Issues at most `max_attempts` status requests and sleeps only between
/// attempts, never after the last one. A job the server reports as failed
/// ends the run with [`TapError::ReportFailed`].
pub async fn poll_until_ready(
    session: &Session,
    job: &mut ReportJob,
    api_base_url: &str,
    settings: &PollSettings,
    sleeper: &dyn Sleeper,
) -> Result<PollOutcome> {
    let url = endpoints::report_job_url(
        api_base_url,
        &job.customer_id,
        &job.account_id,
        &job.job_id,
    );

    for attempt in 1..=settings.max_attempts {
        let response = fetch_status(session, &url).await?;

        match JobStatus::from_remote(&response.status) {
            Some(JobStatus::Completed) => {
                let download_url = response.url.filter(|u| !u.trim().is_empty());
                job.complete(download_url.clone());

                return Ok(match download_url {
                    Some(url) => {
                        info!(job_id = %job.job_id, attempt, "Report ready");
                        PollOutcome::Ready(url)
                    },
                    None => {
                        info!(job_id = %job.job_id, attempt, "Report completed with no data");
                        PollOutcome::ReadyEmpty
                    },
                });
            },
            Some(JobStatus::Failed) => {
                job.advance(JobStatus::Failed);
                return Err(TapError::ReportFailed {
                    job_id: job.job_id.clone(),
                });
            },
            Some(status) => {
                job.advance(status);
            },
            None => {
                warn!(
                    job_id = %job.job_id,
                    status = %response.status,
                    "Unknown report status, treating as in progress"
                );
                job.advance(JobStatus::InProgress);
            },
        }

        if attempt == settings.max_attempts {
            break;
        }

        debug!(
            job_id = %job.job_id,
            attempt,
            max_attempts = settings.max_attempts,
            status = %job.status(),
            "Report not ready, waiting"
        );
        sleeper.sleep(settings.interval).await;
    }

    job.advance(JobStatus::TimedOut);
    warn!(
        job_id = %job.job_id,
        max_attempts = settings.max_attempts,
        "Report job did not complete in time"
    );
    Ok(PollOutcome::TimedOut)
}

async fn fetch_status(session: &Session, url: &str) -> Result<StatusResponse> {
    let response = session.get(url).await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TapError::Status(format!("{status}: {body}")));
    }

    response
        .json()
        .await
        .map_err(|e| TapError::Status(format!("invalid status body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_bound_ten_minutes() {
        let settings = PollSettings::default();
        assert_eq!(settings.max_attempts, 120);
        assert_eq!(settings.interval * settings.max_attempts, Duration::from_secs(600));
    }

    #[test]
    fn test_status_response_accepts_null_url() {
        let parsed: StatusResponse =
            serde_json::from_str(r#"{"Status": "Completed", "Url": null}"#).unwrap();
        assert_eq!(parsed.status, "Completed");
        assert!(parsed.url.is_none());
    }
}
