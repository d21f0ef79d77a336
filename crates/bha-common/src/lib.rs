//! BHA Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared building blocks for the Bing Hotel Ads tap.
//!
//! # Overview
//!
//! - **Logging**: tracing subscriber setup that keeps stdout free for the
//!   message stream
//! - **Messages**: the line-delimited JSON message envelope (`SCHEMA`,
//!   `RECORD`, `STATE`) and the discovery catalog shape
//!
//! # Example
//!
//! ```no_run
//! use bha_common::logging::{init_logging, LogConfig};
//! use bha_common::messages::Message;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let state = Message::state(serde_json::json!({ "start_date": "2024-01-31" }));
//!     println!("{}", state.to_line()?);
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod messages;

pub use messages::{Catalog, CatalogEntry, Message};
