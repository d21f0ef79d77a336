//! One extraction run, from job submission to checkpoint

use chrono::Utc;
use std::io::Write;
use tracing::{info, warn};

use crate::auth::Session;
use crate::catalog::FieldMapping;
use crate::config::RunContext;
use crate::error::Result;
use crate::output::MessageWriter;
use crate::report::{self, PollOutcome, Sleeper};
use crate::schema::infer_schema;
use crate::state::RunState;
use crate::transform::RowTransformer;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// All rows emitted and the checkpoint written
    Completed,
    /// Report finished with no file
    NoData,
    /// Report not ready within the poll ceiling
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub status: SyncStatus,
    pub records: u64,
    /// Checkpoint written at the end of the run, if any
    pub state: Option<RunState>,
}

/// Extract the report for `ctx` and write it to `writer`.
///
/// The checkpoint is written only after the last record, and only when the
/// report was downloaded and read to the end.
pub async fn run_sync<W: Write>(
    session: &Session,
    ctx: &RunContext,
    mapping: &FieldMapping,
    sleeper: &dyn Sleeper,
    writer: &mut MessageWriter<W>,
) -> Result<SyncSummary> {
    let mut job = report::submit_job(session, ctx).await?;

    let outcome =
        report::poll_until_ready(session, &mut job, &ctx.api_base_url, &ctx.poll, sleeper).await?;

    let url = match outcome {
        PollOutcome::Ready(url) => url,
        PollOutcome::ReadyEmpty => {
            info!(job_id = %job.job_id, "No data for the requested range");
            return Ok(SyncSummary {
                status: SyncStatus::NoData,
                records: 0,
                state: None,
            });
        },
        PollOutcome::TimedOut => {
            warn!(job_id = %job.job_id, "Giving up on report, no records emitted");
            return Ok(SyncSummary {
                status: SyncStatus::TimedOut,
                records: 0,
                state: None,
            });
        },
    };

    let mut archive = report::download_report(session, &url).await?;
    let mut stream = archive.open()?;

    let schema = infer_schema(stream.headers(), mapping, &mapping.key_fields());
    info!(
        fields = schema.len(),
        skipped = stream.headers().len().saturating_sub(schema.len()),
        "Schema inferred from report header"
    );
    writer.write_schema(&schema)?;

    let transformer = RowTransformer::new(stream.headers(), &schema);
    let extracted_at = Utc::now();
    let before = writer.records_written();

    for row in stream.rows() {
        let row = row?;
        writer.write_record(transformer.transform(&row)?, extracted_at)?;
    }

    let records = writer.records_written() - before;
    let state = RunState::new(ctx.end_date);
    writer.write_state(&state)?;

    info!(records, next_start_date = %state.start_date, "Sync complete");

    Ok(SyncSummary {
        status: SyncStatus::Completed,
        records,
        state: Some(state),
    })
}
