//! End-to-end runs of the extraction flow against a mock API
//!
//! Covers the three documented outcomes (data, no data, timeout) and the
//! fatal download path, checking the emitted message stream each time.

mod common;

use bha_tap::catalog::FieldMapping;
use bha_tap::output::MessageWriter;
use bha_tap::report::download_report;
use bha_tap::sync::{run_sync, SyncStatus};
use bha_tap::TapError;
use common::{
    context, job_path, jobs_path, report_zip, session, RecordingSleeper, WithoutCredentials,
    JOB_ID,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(jobs_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": JOB_ID })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_ready(server: &MockServer, report_csv: &str) {
    let url = format!("{}/download/report.zip", server.uri());
    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Status": "Completed", "Url": url })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/download/report.zip"))
        .and(WithoutCredentials)
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(report_zip(report_csv)),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn messages(bytes: Vec<u8>) -> Vec<Value> {
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_run_emits_schema_records_and_state() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_ready(
        &server,
        concat!(
            "\"HotelId\",\"Clicks\",\"Impressions\"\r\n",
            "\"42\",\"1,000\",\"5\"\r\n",
            "\"43\",\"\",\"12\"\r\n",
        ),
    )
    .await;

    let session = session(&server, "access", "refresh");
    let sleeper = RecordingSleeper::default();
    let mut writer = MessageWriter::new(Vec::new());

    let summary = run_sync(
        &session,
        &context(&server),
        FieldMapping::hotel_performance(),
        &sleeper,
        &mut writer,
    )
    .await
    .unwrap();

    assert_eq!(summary.status, SyncStatus::Completed);
    assert_eq!(summary.records, 2);

    let out = messages(writer.into_inner());
    assert_eq!(out.len(), 4);

    assert_eq!(out[0]["type"], "SCHEMA");
    assert_eq!(out[0]["key_properties"], json!(["hotel_id"]));
    let properties = out[0]["schema"]["properties"].as_object().unwrap();
    assert_eq!(properties.len(), 3);
    assert_eq!(properties["clicks"]["type"], json!(["null", "integer"]));

    assert_eq!(out[1]["type"], "RECORD");
    assert_eq!(
        out[1]["record"],
        json!({"hotel_id": "42", "clicks": 1000, "impressions": 5})
    );
    assert_eq!(
        out[2]["record"],
        json!({"hotel_id": "43", "clicks": null, "impressions": 12})
    );

    assert_eq!(
        out[3],
        json!({"type": "STATE", "value": {"start_date": "2024-01-31"}})
    );
}

#[tokio::test]
async fn test_unmapped_columns_and_empty_lines_are_skipped() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_ready(
        &server,
        "HotelId,Brand New Column,Date,CTR\n42,x,1/15/2024,12.5%\n\n43,y,1/16/2024,0.75%\n",
    )
    .await;

    let session = session(&server, "access", "refresh");
    let mut writer = MessageWriter::new(Vec::new());

    let summary = run_sync(
        &session,
        &context(&server),
        FieldMapping::hotel_performance(),
        &RecordingSleeper::default(),
        &mut writer,
    )
    .await
    .unwrap();
    assert_eq!(summary.records, 2);

    let out = messages(writer.into_inner());
    assert_eq!(out[0]["key_properties"], json!(["hotel_id", "date"]));
    assert_eq!(
        out[1]["record"],
        json!({"hotel_id": "42", "date": "2024-01-15T00:00:00+00:00", "ctr": 12.5})
    );
    assert_eq!(out[2]["record"]["ctr"], json!(0.75));
}

#[tokio::test]
async fn test_row_of_blank_cells_is_an_all_null_record() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_ready(&server, "HotelId,Clicks,CTR\n42,3,1.5%\n\"\",\"\", \n").await;

    let session = session(&server, "access", "refresh");
    let mut writer = MessageWriter::new(Vec::new());

    let summary = run_sync(
        &session,
        &context(&server),
        FieldMapping::hotel_performance(),
        &RecordingSleeper::default(),
        &mut writer,
    )
    .await
    .unwrap();
    assert_eq!(summary.records, 2);

    let out = messages(writer.into_inner());
    assert_eq!(out.len(), 4);
    assert_eq!(
        out[2]["record"],
        json!({"hotel_id": null, "clicks": null, "ctr": null})
    );
    assert_eq!(out[3]["type"], "STATE");
}

#[tokio::test]
async fn test_completed_without_file_emits_nothing() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Status": "Completed", "Url": null })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, "access", "refresh");
    let mut writer = MessageWriter::new(Vec::new());

    let summary = run_sync(
        &session,
        &context(&server),
        FieldMapping::hotel_performance(),
        &RecordingSleeper::default(),
        &mut writer,
    )
    .await
    .unwrap();

    assert_eq!(summary.status, SyncStatus::NoData);
    assert_eq!(summary.records, 0);
    assert!(summary.state.is_none());
    assert!(writer.into_inner().is_empty());
}

#[tokio::test]
async fn test_timeout_emits_nothing() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Status": "InProgress" })),
        )
        .expect(120)
        .mount(&server)
        .await;

    let session = session(&server, "access", "refresh");
    let sleeper = RecordingSleeper::default();
    let mut writer = MessageWriter::new(Vec::new());

    let summary = run_sync(
        &session,
        &context(&server),
        FieldMapping::hotel_performance(),
        &sleeper,
        &mut writer,
    )
    .await
    .unwrap();

    assert_eq!(summary.status, SyncStatus::TimedOut);
    assert!(summary.state.is_none());
    assert_eq!(sleeper.waits().len(), 119);
    assert!(writer.into_inner().is_empty());
}

#[tokio::test]
async fn test_download_failure_writes_no_state() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    let url = format!("{}/download/missing.zip", server.uri());
    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Status": "Completed", "Url": url })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, "access", "refresh");
    let mut writer = MessageWriter::new(Vec::new());

    let result = run_sync(
        &session,
        &context(&server),
        FieldMapping::hotel_performance(),
        &RecordingSleeper::default(),
        &mut writer,
    )
    .await;

    assert!(matches!(result, Err(TapError::Download(_))));
    let out = messages(writer.into_inner());
    assert!(out.iter().all(|m| m["type"] != "STATE"));
}

#[tokio::test]
async fn test_bad_cell_aborts_before_state() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    mount_ready(&server, "HotelId,Clicks\n42,10\n43,many\n").await;

    let session = session(&server, "access", "refresh");
    let mut writer = MessageWriter::new(Vec::new());

    let result = run_sync(
        &session,
        &context(&server),
        FieldMapping::hotel_performance(),
        &RecordingSleeper::default(),
        &mut writer,
    )
    .await;

    assert!(matches!(result, Err(TapError::Transform { .. })));
    let out = messages(writer.into_inner());
    // already emitted records stay emitted
    assert_eq!(out.len(), 2);
    assert_eq!(out[1]["type"], "RECORD");
}

#[tokio::test]
async fn test_download_link_gets_no_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/download/report.zip"))
        .and(WithoutCredentials)
        .respond_with(ResponseTemplate::new(200).set_body_bytes(report_zip("HotelId\n42\n")))
        .expect(1)
        .mount(&server)
        .await;
    // anything carrying a token lands here instead
    Mock::given(method("GET"))
        .and(path("/download/report.zip"))
        .respond_with(ResponseTemplate::new(403))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = common::session_config(&server);
    config.developer_token = Some("dev-123".to_string());
    let session = bha_tap::auth::Session::acquire(
        bha_tap::auth::Credentials::new("access", "refresh", "client-id"),
        config,
    )
    .unwrap();

    let url = format!("{}/download/report.zip", server.uri());
    let mut archive = download_report(&session, &url).await.unwrap();
    let stream = archive.open().unwrap();
    assert_eq!(stream.headers(), ["HotelId"]);
}
