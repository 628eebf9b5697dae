use tracing_subscriber::EnvFilter;

use ecfr_pipeline::config::IngestConfig;
use ecfr_pipeline::ingest::run_ingest;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    match run_ingest(&config).await {
        Ok(report) => {
            tracing::info!(
                status = %report.status,
                records = report.record_count,
                titles = report.titles_loaded.len(),
                skipped = report.skipped_titles.len(),
                "ingestion complete"
            );
            std::process::exit(report.status.exit_code());
        }
        Err(e) => {
            tracing::error!(error = %e, "ingestion aborted");
            std::process::exit(1);
        }
    }
}
