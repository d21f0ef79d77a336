//! Shared helpers for the tap integration tests
//!
//! - Report archive builder matching the API's zip layout
//! - A [`Sleeper`] that records requested waits instead of sleeping
//! - Session and run context wired to a `wiremock` server

#![allow(dead_code)]

use async_trait::async_trait;
use bha_tap::auth::{Credentials, Session, SessionConfig};
use bha_tap::config::RunContext;
use bha_tap::report::{PollSettings, Sleeper};
use chrono::NaiveDate;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::{Match, MockServer, Request};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const CUSTOMER_ID: &str = "1001";
pub const ACCOUNT_ID: &str = "2002";
pub const JOB_ID: &str = "job-7";

pub const TOKEN_PATH: &str = "/oauth/token";

/// Banner lines as the API writes them
pub const BANNER: &str =
    "\"Report Name: Performance\"\r\n\"Report Time: 1/1/2024-1/31/2024\"\r\n\"Time Zone: UTC\"\r\n";

/// Path of the job collection on the mock server
pub fn jobs_path() -> String {
    format!("/Customers({CUSTOMER_ID})/Accounts({ACCOUNT_ID})/ReportJobs")
}

/// Path of the test job's status resource on the mock server
pub fn job_path() -> String {
    format!("{}('{JOB_ID}')", jobs_path())
}

/// Zip a report body (banner + `csv`) into a single-entry archive
pub fn report_zip(csv: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("HotelPerformance.csv", FileOptions::default())
        .unwrap();
    writer.write_all(BANNER.as_bytes()).unwrap();
    writer.write_all(csv.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Records every requested wait without suspending
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Matches requests carrying neither a bearer nor a developer token
pub struct WithoutCredentials;

impl Match for WithoutCredentials {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
            && !request.headers.contains_key("developertoken")
    }
}

pub fn session_config(server: &MockServer) -> SessionConfig {
    SessionConfig {
        token_url: format!("{}{TOKEN_PATH}", server.uri()),
        ..SessionConfig::default()
    }
}

pub fn session(server: &MockServer, access_token: &str, refresh_token: &str) -> Session {
    Session::acquire(
        Credentials::new(access_token, refresh_token, "client-id"),
        session_config(server),
    )
    .unwrap()
}

pub fn context(server: &MockServer) -> RunContext {
    RunContext {
        customer_id: CUSTOMER_ID.to_string(),
        account_id: ACCOUNT_ID.to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        columns: vec![
            "HotelId".to_string(),
            "Clicks".to_string(),
            "Impressions".to_string(),
        ],
        api_base_url: server.uri(),
        poll: PollSettings::default(),
    }
}
