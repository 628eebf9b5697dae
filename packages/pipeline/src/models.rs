use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to a record between two snapshots.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Amended,
    Removed,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum::Display,
    strum::EnumString,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IngestStatus {
    Running,
    Success,
    /// Finished, but one or more pages were skipped.
    Partial,
    Failed,
}

impl IngestStatus {
    /// Process exit code of the ingestion job for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Partial => 2,
            Self::Running | Self::Failed => 1,
        }
    }
}

/// One entry of a record's append-only change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RevisionEntry {
    pub record_id: String,
    pub seq: i64,
    /// Effective date of the snapshot that produced the change.
    pub recorded_on: NaiveDate,
    pub kind: ChangeKind,
    /// Change in body length, in characters.
    pub delta_chars: i64,
    pub agency_slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub effective_date: NaiveDate,
    pub status: IngestStatus,
    pub record_count: i64,
    pub skipped_pages: i64,
    pub error: Option<String>,
}

/// Final state written to a run by `Warehouse::finish_run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: IngestStatus,
    pub record_count: i64,
    pub skipped_pages: i64,
    pub error: Option<String>,
}

/// Per-title outcome of a warehouse load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub added: usize,
    pub amended: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl LoadSummary {
    pub fn changed(&self) -> usize {
        self.added + self.amended + self.removed
    }
}
