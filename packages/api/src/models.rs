use chrono::{DateTime, NaiveDate, Utc};
use ecfr_pipeline::{IngestRun, RevisionEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgencySummary {
    pub slug: String,
    pub name: String,
    pub short_name: Option<String>,
    pub parent_slug: Option<String>,
    pub record_count: i64,
    pub word_count: i64,
}

/// A CFR title with the number of sections stored for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TitleInfo {
    pub number: i64,
    pub name: String,
    pub latest_amended_on: Option<NaiveDate>,
    pub up_to_date_as_of: Option<NaiveDate>,
    pub reserved: bool,
    pub section_count: i64,
}

/// Inclusive date range applied to change events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyMetrics {
    pub agency: String,
    pub name: String,
    pub range: DateRange,
    pub record_count: i64,
    pub word_count: i64,
    pub changes: Vec<RevisionEntry>,
    /// `None` when no stated-goals text is configured.
    pub alignment_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub metric: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub agency: String,
    pub slug: String,
    pub word_count: i64,
    /// Formatted as `"word (count)"`.
    pub top_words: Vec<String>,
    pub document_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub data: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based rank within the result list.
    pub id: i64,
    pub record_id: String,
    pub agency: String,
    pub agency_slug: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshInfo {
    pub detail: String,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub run: Option<IngestRun>,
}

/// `?search=` filter shared by the overview endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// Raw `?from=&to=` parameters; parsed by the handler so bad dates get a
/// JSON error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}
