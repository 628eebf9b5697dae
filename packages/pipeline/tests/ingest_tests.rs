mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{date, title_xml, TestDb, AGENCIES_JSON, EPA};
use ecfr_harvester::{ClientConfig, ErrorKind};
use ecfr_pipeline::models::IngestStatus;
use ecfr_pipeline::{ingest, run_ingest, IngestConfig, PipelineError};

fn client_config(server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_base_url(server.uri())
        .with_retry_base_delay(Duration::from_millis(1))
}

const TITLES_JSON: &str = r#"{"titles": [
    {"number": 1, "name": "General Provisions", "latest_amended_on": "2024-12-20",
     "up_to_date_as_of": "2025-01-03", "reserved": false},
    {"number": 35, "name": "Reserved", "reserved": true},
    {"number": 40, "name": "Protection of Environment", "latest_amended_on": "2025-01-02",
     "up_to_date_as_of": "2025-01-03", "reserved": false}
]}"#;

/// Mount the agency list and the title summaries.
async fn mount_agencies(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/admin/v1/agencies.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(AGENCIES_JSON))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/versioner/v1/titles.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TITLES_JSON))
        .mount(server)
        .await;
}

async fn mount_title(server: &MockServer, title: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/versioner/v1/full/2025-01-06/title-{title}.xml")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingest_loads_every_page() {
    let server = MockServer::start().await;
    mount_agencies(&server).await;
    mount_title(&server, 1, title_xml(1, "III", 100)).await;
    mount_title(&server, 40, title_xml(40, "I", 37)).await;
    let db = TestDb::new().await;

    let report = ingest(
        &db.warehouse,
        client_config(&server),
        Some(vec![1, 40]),
        date(2025, 1, 6),
    )
    .await
    .unwrap();

    assert_eq!(report.status, IngestStatus::Success);
    assert_eq!(report.agencies, 2);
    assert_eq!(report.titles_loaded, vec![1, 40]);
    assert_eq!(report.record_count, 137);
    assert_eq!(db.warehouse.record_count().await.unwrap(), 137);

    let run = db.warehouse.latest_run().await.unwrap().unwrap();
    assert_eq!(run.id, report.run_id);
    assert_eq!(run.status, IngestStatus::Success);
    assert_eq!(run.record_count, 137);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rerun_with_same_upstream_is_idempotent() {
    let server = MockServer::start().await;
    mount_agencies(&server).await;
    mount_title(&server, 40, title_xml(40, "I", 12)).await;
    let db = TestDb::new().await;

    ingest(&db.warehouse, client_config(&server), Some(vec![40]), date(2025, 1, 6))
        .await
        .unwrap();
    let first = db.warehouse.snapshot_digest().await.unwrap();

    ingest(&db.warehouse, client_config(&server), Some(vec![40]), date(2025, 1, 6))
        .await
        .unwrap();
    let second = db.warehouse.snapshot_digest().await.unwrap();

    assert_eq!(first, second);
    let revisions = db.warehouse.revisions("40 CFR 40.1").await.unwrap();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].agency_slug, EPA);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unparseable_page_is_skipped() {
    let server = MockServer::start().await;
    mount_agencies(&server).await;
    mount_title(&server, 1, "<ECFR><DIV1".to_string()).await;
    mount_title(&server, 40, title_xml(40, "I", 5)).await;
    let db = TestDb::new().await;

    let report = ingest(
        &db.warehouse,
        client_config(&server),
        Some(vec![1, 40]),
        date(2025, 1, 6),
    )
    .await
    .unwrap();

    assert_eq!(report.status, IngestStatus::Partial);
    assert_eq!(report.status.exit_code(), 2);
    assert_eq!(report.skipped_titles, vec![1]);
    assert_eq!(report.titles_loaded, vec![40]);
    assert_eq!(report.record_count, 5);

    let run = db.warehouse.latest_run().await.unwrap().unwrap();
    assert_eq!(run.status, IngestStatus::Partial);
    assert_eq!(run.skipped_pages, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_every_page_unparseable_fails() {
    let server = MockServer::start().await;
    mount_agencies(&server).await;
    mount_title(&server, 40, "<ECFR/>".to_string()).await;
    let db = TestDb::new().await;

    let report = ingest(&db.warehouse, client_config(&server), Some(vec![40]), date(2025, 1, 6))
        .await
        .unwrap();

    assert_eq!(report.status, IngestStatus::Failed);
    assert_eq!(report.status.exit_code(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_network_failure_aborts_and_marks_run_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/v1/agencies.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    let db = TestDb::new().await;

    let err = ingest(&db.warehouse, client_config(&server), Some(vec![40]), date(2025, 1, 6))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Registry(_)));
    let run = db.warehouse.latest_run().await.unwrap().unwrap();
    assert_eq!(run.status, IngestStatus::Failed);
    assert!(run.error.unwrap().contains("after 3 attempts"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_default_titles_come_from_titles_endpoint() {
    let server = MockServer::start().await;
    mount_agencies(&server).await;
    mount_title(&server, 1, title_xml(1, "III", 2)).await;
    mount_title(&server, 40, title_xml(40, "I", 3)).await;
    let db = TestDb::new().await;

    let report = ingest(&db.warehouse, client_config(&server), None, date(2025, 1, 6))
        .await
        .unwrap();

    assert_eq!(report.titles_loaded, vec![1, 40]);
    assert_eq!(report.record_count, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_title_summaries_are_stored() {
    let server = MockServer::start().await;
    mount_agencies(&server).await;
    mount_title(&server, 40, title_xml(40, "I", 3)).await;
    let db = TestDb::new().await;

    ingest(&db.warehouse, client_config(&server), Some(vec![40]), date(2025, 1, 6))
        .await
        .unwrap();

    let titles: Vec<(i64, String, Option<String>, bool)> = sqlx::query_as(
        "SELECT number, name, latest_amended_on, reserved FROM titles ORDER BY number",
    )
    .fetch_all(db.warehouse.pool())
    .await
    .unwrap();

    assert_eq!(
        titles,
        vec![
            (1, "General Provisions".to_string(), Some("2024-12-20".to_string()), false),
            (35, "Reserved".to_string(), None, true),
            (40, "Protection of Environment".to_string(), Some("2025-01-02".to_string()), false),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_ingest_opens_configured_store() {
    let server = MockServer::start().await;
    mount_agencies(&server).await;
    mount_title(&server, 40, title_xml(40, "I", 4)).await;
    let dir = tempfile::tempdir().unwrap();

    let config = IngestConfig::new(
        ecfr_pipeline::StoreConfig::new(dir.path().join("fresh.db")),
        client_config(&server),
    )
    .with_titles(vec![40])
    .with_date(date(2025, 1, 6));

    let report = run_ingest(&config).await.unwrap();

    assert_eq!(report.status, IngestStatus::Success);
    assert!(dir.path().join("fresh.db").exists());
}

/// Registry that serves the agency list and title summaries in full but
/// drops every title download partway through its body.
///
/// Returns the base URL and the number of title requests seen.
fn registry_dropping_title_bodies() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let title_requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&title_requests);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);

            let index = if request.contains("/admin/v1/agencies.json") {
                Some(AGENCIES_JSON)
            } else if request.contains("/versioner/v1/titles.json") {
                Some(TITLES_JSON)
            } else {
                None
            };
            let response = if let Some(body) = index {
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
            } else {
                counter.fetch_add(1, Ordering::SeqCst);
                "HTTP/1.1 200 OK\r\nContent-Length: 5000\r\n\r\n<?xml version=\"1.0\"?><ECFR><DIV1"
                    .to_string()
            };
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    (base_url, title_requests)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_body_dropped_mid_read_fails_the_run() {
    let (base_url, title_requests) = registry_dropping_title_bodies();
    let config = ClientConfig::default()
        .with_base_url(base_url)
        .with_max_attempts(3)
        .with_retry_base_delay(Duration::from_millis(1));
    let db = TestDb::new().await;

    let err = ingest(&db.warehouse, config, Some(vec![40]), date(2025, 1, 6))
        .await
        .unwrap_err();

    match &err {
        PipelineError::Registry(e) => assert_eq!(e.kind(), ErrorKind::Network),
        other => panic!("expected a registry error, got {other:?}"),
    }
    assert_eq!(title_requests.load(Ordering::SeqCst), 3);

    let run = db.warehouse.latest_run().await.unwrap().unwrap();
    assert_eq!(run.status, IngestStatus::Failed);
    assert_eq!(run.status.exit_code(), 1);
    assert_eq!(run.skipped_pages, 0);
    assert!(run.error.unwrap().contains("after 3 attempts"));
    assert_eq!(db.warehouse.record_count().await.unwrap(), 0);
}
