use std::path::PathBuf;

use ecfr_pipeline::StoreConfig;

pub const DEFAULT_API_PORT: u16 = 8000;
pub const DEFAULT_DASHBOARD_PORT: u16 = 8501;
pub const DEFAULT_METRICS_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub store: StoreConfig,
    pub port: u16,
    /// Reference text the alignment score compares regulation text against.
    pub stated_goals_path: Option<PathBuf>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let store = StoreConfig::from_vars(&var);
        let port = parse_port(var("API_PORT"), DEFAULT_API_PORT);
        let stated_goals_path = var("STATED_GOALS_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Self {
            store,
            port,
            stated_goals_path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub port: u16,
    /// Base URL of the metrics API, without the `/api` suffix.
    pub api_url: String,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let port = parse_port(var("DASHBOARD_PORT"), DEFAULT_DASHBOARD_PORT);
        let api_url = var("METRICS_API_URL")
            .unwrap_or_else(|| DEFAULT_METRICS_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self { port, api_url }
    }

    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_DASHBOARD_PORT,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn parse_port(raw: Option<String>, default: u16) -> u16 {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, default, "invalid port, using default");
            default
        }),
        None => default,
    }
}
