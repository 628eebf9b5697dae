use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use ecfr_api::dashboard::{self, DashboardState};
use ecfr_api::DashboardConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DashboardConfig::from_env();

    let state = match DashboardState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise dashboard");
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(api_url = %config.api_url, "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to bind on {addr}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, dashboard::router(state)).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
