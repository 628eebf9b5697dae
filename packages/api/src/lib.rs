//! eCFR metrics API and dashboard.
//!
//! [`router`] serves the JSON metrics API over the local warehouse;
//! [`dashboard::router`] serves HTML pages rendered from that API.

pub mod alignment;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod state;
pub mod words;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use alignment::{Alignment, AlignmentScorer, TermOverlapScorer};
pub use config::{ApiConfig, DashboardConfig};
pub use error::ApiError;
pub use state::AppState;

/// Build the metrics API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/agencies", get(handlers::list_agencies))
        .route("/api/agencies/{slug}/metrics", get(handlers::agency_metrics))
        .route("/api/titles", get(handlers::list_titles))
        .route("/api/kpi", get(handlers::kpi))
        .route("/api/chart", get(handlers::chart))
        .route("/api/table", get(handlers::table))
        .route("/api/search", post(handlers::search))
        .route("/api/refresh", get(handlers::refresh))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
