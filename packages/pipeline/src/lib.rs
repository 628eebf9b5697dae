pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod warehouse;

pub use config::{IngestConfig, StoreConfig};
pub use db::{create_pool, run_migrations};
pub use error::PipelineError;
pub use ingest::{ingest, run_ingest, IngestReport};
pub use models::{ChangeKind, IngestRun, IngestStatus, LoadSummary, RevisionEntry, RunOutcome};
pub use warehouse::Warehouse;
