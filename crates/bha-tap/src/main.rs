//! tap-bing-hotel-ads - Bing Hotel Ads report extraction

use anyhow::{Context, Result};
use bha_common::logging::{init_logging, LogConfig, LogLevel};
use bha_tap::auth::Session;
use bha_tap::catalog::FieldMapping;
use bha_tap::config::TapConfig;
use bha_tap::output::{MessageWriter, STREAM_NAME};
use bha_tap::report::TokioSleeper;
use bha_tap::state::RunState;
use bha_tap::{discover, sync};
use chrono::Utc;
use clap::Parser;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "tap-bing-hotel-ads")]
#[command(author, version, about = "Extract Bing Hotel Ads performance reports")]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, env = "TAP_BHA_CONFIG", required_unless_present = "discover")]
    config: Option<PathBuf>,

    /// State file from a previous run
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Print the catalog and exit
    #[arg(short, long)]
    discover: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("tap-bing-hotel-ads")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    if let Err(e) = run(&cli).await {
        error!(error = %e, "Tap run failed");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let mapping = FieldMapping::hotel_performance();
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cli.discover {
        info!("Running discovery");
        serde_json::to_writer_pretty(&mut out, &discover::discover(mapping))?;
        writeln!(out)?;
        out.flush()?;
        return Ok(());
    }

    let config_path = cli
        .config
        .as_deref()
        .context("--config is required unless --discover is given")?;
    let mut config = TapConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let state = match &cli.state {
        Some(path) => RunState::load(path, STREAM_NAME)?,
        None => None,
    };

    let ctx = config.run_context(state.as_ref(), Utc::now().date_naive())?;
    let session = Session::acquire(config.credentials(), config.session_config())?;

    let mut writer = MessageWriter::new(out);
    let result = sync::run_sync(&session, &ctx, mapping, &TokioSleeper, &mut writer).await;
    let flushed = writer.flush();

    save_credentials(&mut config, config_path, &session).await;

    let summary = result?;
    flushed?;
    info!(status = ?summary.status, records = summary.records, "Tap run finished");
    Ok(())
}

async fn save_credentials(config: &mut TapConfig, path: &Path, session: &Session) {
    let credentials = session.credentials().await;
    match config.persist_credentials(path, &credentials) {
        Ok(true) => info!("Stored refreshed credentials"),
        Ok(false) => {},
        Err(e) => warn!(error = %e, "Could not store refreshed credentials"),
    }
}
