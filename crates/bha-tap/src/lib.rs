//! Bing Hotel Ads report tap
//!
//! Extracts the hotel performance report from the Bing Ads Hotel API and
//! writes it as a line-delimited message stream.
//!
//! A run submits a report job, polls it until ready, downloads the zipped
//! CSV, infers an output schema from its header and emits one record per
//! row followed by a checkpoint.
//!
//! # Example
//!
//! ```no_run
//! use bha_tap::{auth::Session, catalog::FieldMapping, config::TapConfig};
//! use bha_tap::{output::MessageWriter, report::TokioSleeper, sync::run_sync};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TapConfig::load("config.json")?;
//!     let ctx = config.run_context(None, chrono::Utc::now().date_naive())?;
//!     let session = Session::acquire(config.credentials(), config.session_config())?;
//!
//!     let mut writer = MessageWriter::new(std::io::stdout().lock());
//!     let mapping = FieldMapping::hotel_performance();
//!     run_sync(&session, &ctx, mapping, &TokioSleeper, &mut writer).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod catalog;
pub mod config;
pub mod discover;
pub mod endpoints;
pub mod error;
pub mod output;
pub mod report;
pub mod schema;
pub mod state;
pub mod sync;
pub mod transform;

pub use error::{Result, TapError};
