#![allow(dead_code)]

use chrono::NaiveDate;
use tempfile::TempDir;

use ecfr_harvester::{Agency, CfrReference, Hierarchy, RegulationRecord};
use ecfr_pipeline::config::StoreConfig;
use ecfr_pipeline::Warehouse;

pub const EPA: &str = "environmental-protection-agency";
pub const ACUS: &str = "administrative-conference-of-the-united-states";

pub struct TestDb {
    pub warehouse: Warehouse,
    pub config: StoreConfig,
    // Hold the directory so the database file outlives the test body
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("ecfr_test.db"));
        let warehouse = Warehouse::open(&config).await.unwrap();

        Self {
            warehouse,
            config,
            _dir: dir,
        }
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

pub fn record(title: u32, section: &str, agency: &str, text: &str) -> RegulationRecord {
    RegulationRecord {
        id: RegulationRecord::citation(title, section),
        agency: agency.to_string(),
        hierarchy: Hierarchy {
            title,
            chapter: Some("I".to_string()),
            part: Some("1".to_string()),
            ..Hierarchy::default()
        },
        section: section.to_string(),
        heading: format!("§ {section} Heading."),
        text: text.to_string(),
        effective_date: date(2025, 1, 6),
        revision_ref: format!("http://api/versioner/v1/versions/title-{title}.json?section={section}"),
    }
}

pub fn records(title: u32, agency: &str, count: usize) -> Vec<RegulationRecord> {
    (1..=count)
        .map(|i| record(title, &format!("{title}.{i}"), agency, &format!("Text of section {i}.")))
        .collect()
}

pub const AGENCIES_JSON: &str = r#"{
  "agencies": [
    {"name": "Environmental Protection Agency", "short_name": "EPA",
     "slug": "environmental-protection-agency", "children": [],
     "cfr_references": [{"title": 40, "chapter": "I"}]},
    {"name": "Administrative Conference of the United States", "short_name": "ACUS",
     "slug": "administrative-conference-of-the-united-states", "children": [],
     "cfr_references": [{"title": 1, "chapter": "III"}]}
  ]
}"#;

/// Full-title XML with `sections` sections in one chapter.
pub fn title_xml(title: u32, chapter: &str, sections: usize) -> String {
    let body: String = (1..=sections)
        .map(|i| {
            format!(
                r#"<DIV8 N="§ {title}.{i}" TYPE="SECTION"><HEAD>§ {title}.{i} Section {i}.</HEAD><P>Text of section {i}.</P></DIV8>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ECFR><DIV1 N="{title}" TYPE="TITLE"><DIV3 N="{chapter}" TYPE="CHAPTER"><DIV5 N="1" TYPE="PART">{body}</DIV5></DIV3></DIV1></ECFR>"#
    )
}
