use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use ecfr_api::{router, Alignment, ApiConfig, AppState};
use ecfr_pipeline::Warehouse;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env();

    let warehouse = match Warehouse::open(&config.store).await {
        Ok(warehouse) => warehouse,
        Err(e) => {
            let path = config.store.db_path.display();
            tracing::error!(error = %e, %path, "failed to open warehouse");
            std::process::exit(1);
        }
    };

    let alignment = match Alignment::load(config.stated_goals_path.as_deref()) {
        Ok(alignment) => alignment,
        Err(e) => {
            tracing::error!(error = %e, "failed to read STATED_GOALS_PATH");
            std::process::exit(1);
        }
    };
    if !alignment.is_enabled() {
        tracing::info!("STATED_GOALS_PATH not set, alignment scores disabled");
    }

    let app = router(AppState::new(warehouse.pool().clone(), alignment));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to bind on {addr}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
