//! Report job lifecycle
//!
//! - **job**: job model and submission
//! - **poller**: bounded status polling
//! - **extract**: archive download and CSV line streaming

pub mod extract;
pub mod job;
pub mod poller;

pub use extract::{download_report, ReportArchive, ReportStream, BANNER_LINES};
pub use job::{submit_job, JobStatus, ReportJob};
pub use poller::{poll_until_ready, PollOutcome, PollSettings, Sleeper, TokioSleeper};
