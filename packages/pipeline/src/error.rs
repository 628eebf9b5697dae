use chrono::NaiveDate;
use ecfr_harvester::HarvesterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("registry error: {0}")]
    Registry(#[from] HarvesterError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("stale snapshot for title {title}: {effective_date} is older than the loaded {latest}")]
    StaleSnapshot {
        title: u32,
        effective_date: NaiveDate,
        latest: NaiveDate,
    },

    #[error("run not found: {0}")]
    RunNotFound(uuid::Uuid),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// True when the error comes from the local store rather than the registry.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Migration(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
