#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ecfr_api::{router, Alignment, AppState};
use ecfr_harvester::{Agency, CfrReference, Hierarchy, RegulationRecord};
use ecfr_pipeline::{StoreConfig, Warehouse};

pub const EPA: &str = "environmental-protection-agency";
pub const ACUS: &str = "administrative-conference-of-the-united-states";

pub struct TestDb {
    pub warehouse: Warehouse,
    // Hold the directory so the database file outlives the test body
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("api_test.db"));
        let warehouse = Warehouse::open(&config).await.unwrap();
        Self {
            warehouse,
            _dir: dir,
        }
    }

    /// Store with the EPA and ACUS fixtures loaded on 2025-01-06.
    pub async fn seeded() -> Self {
        let db = Self::new().await;
        db.warehouse.load_agencies(&agencies()).await.unwrap();
        db.warehouse
            .load_title(40, date(2025, 1, 6), &epa_records())
            .await
            .unwrap();
        db.warehouse
            .load_title(1, date(2025, 1, 6), &acus_records())
            .await
            .unwrap();
        db
    }

    pub fn app(&self) -> Router {
        self.app_with(Alignment::disabled())
    }

    pub fn app_with(&self, alignment: Alignment) -> Router {
        router(AppState::new(self.warehouse.pool().clone(), alignment))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn agencies() -> Vec<Agency> {
    vec![
        Agency {
            slug: EPA.to_string(),
            name: "Environmental Protection Agency".to_string(),
            short_name: Some("EPA".to_string()),
            parent_slug: None,
            cfr_references: vec![CfrReference {
                title: 40,
                chapter: Some("I".to_string()),
            }],
        },
        Agency {
            slug: ACUS.to_string(),
            name: "Administrative Conference of the United States".to_string(),
            short_name: Some("ACUS".to_string()),
            parent_slug: None,
            cfr_references: vec![CfrReference {
                title: 1,
                chapter: Some("III".to_string()),
            }],
        },
    ]
}

pub fn record(
    title: u32,
    section: &str,
    agency: &str,
    heading: &str,
    text: &str,
) -> RegulationRecord {
    RegulationRecord {
        id: RegulationRecord::citation(title, section),
        agency: agency.to_string(),
        hierarchy: Hierarchy {
            title,
            ..Hierarchy::default()
        },
        section: section.to_string(),
        heading: heading.to_string(),
        text: text.to_string(),
        effective_date: date(2025, 1, 6),
        revision_ref: String::new(),
    }
}

pub fn epa_records() -> Vec<RegulationRecord> {
    vec![
        record(
            40,
            "1.1",
            EPA,
            "§ 1.1 Creation and authority.",
            "The Environmental Protection Agency protects clean water.",
        ),
        record(
            40,
            "1.3",
            EPA,
            "§ 1.3 Purpose.",
            "Water quality standards protect public health.",
        ),
        record(40, "1.5", EPA, "§ 1.5 Definitions.", "Water means surface water."),
    ]
}

pub fn acus_records() -> Vec<RegulationRecord> {
    vec![
        record(
            1,
            "301.1",
            ACUS,
            "§ 301.1 Purpose.",
            "The Conference studies administrative procedure.",
        ),
        record(1, "301.2", ACUS, "§ 301.2 Membership.", "Members serve terms."),
    ]
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}
