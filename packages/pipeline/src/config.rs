use std::path::PathBuf;

use chrono::NaiveDate;
use ecfr_harvester::config::ECFR_API_BASE;
use ecfr_harvester::{validate_date, validate_title, ClientConfig};

use crate::error::{PipelineError, Result};

/// Default location of the SQLite store.
pub const DEFAULT_DB_PATH: &str = "ecfr_analyzer.db";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; `from_env` passes the process
    /// environment.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = var("ECFR_DB_PATH")
            .unwrap_or_else(|| DEFAULT_DB_PATH.into())
            .into();

        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self {
            db_path,
            max_connections,
        }
    }

    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            max_connections: 5,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub store: StoreConfig,
    pub client: ClientConfig,
    /// Titles to ingest; `None` means every non-reserved title.
    pub titles: Option<Vec<u32>>,
    /// Snapshot date; `None` means today.
    pub date: Option<NaiveDate>,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store = StoreConfig::from_vars(&var);

        let mut client = ClientConfig::default()
            .with_base_url(var("ECFR_API_BASE").unwrap_or_else(|| ECFR_API_BASE.into()));
        if let Some(raw) = var("ECFR_MAX_ATTEMPTS") {
            let attempts = raw.parse().map_err(|_| {
                PipelineError::Config(format!("ECFR_MAX_ATTEMPTS is not a number: '{raw}'"))
            })?;
            client = client.with_max_attempts(attempts);
        }

        let titles = match var("ECFR_TITLES") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_titles(&raw)?),
            _ => None,
        };

        let date = var("ECFR_DATE")
            .map(|raw| validate_date(&raw))
            .transpose()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        Ok(Self {
            store,
            client,
            titles,
            date,
        })
    }

    pub fn new(store: StoreConfig, client: ClientConfig) -> Self {
        Self {
            store,
            client,
            titles: None,
            date: None,
        }
    }

    pub fn with_titles(mut self, titles: Vec<u32>) -> Self {
        self.titles = Some(titles);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Parse a comma-separated title list such as `"1, 40,49"`.
fn parse_titles(raw: &str) -> Result<Vec<u32>> {
    let mut titles = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| validate_title(t).map_err(|e| PipelineError::Config(e.to_string())))
        .collect::<Result<Vec<_>>>()?;
    titles.sort_unstable();
    titles.dedup();
    Ok(titles)
}
