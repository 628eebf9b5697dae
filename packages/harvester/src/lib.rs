//! eCFR Harvester - Download federal regulation text from the eCFR registry.
//!
//! This crate reads the public Electronic Code of Federal Regulations API
//! and turns it into [`RegulationRecord`]s: one record per CFR section,
//! owned by exactly one agency.
//!
//! # Example
//!
//! ```
//! use ecfr_harvester::config;
//!
//! // Validate title and date before hitting the network
//! assert!(config::validate_title("40").is_ok());
//! assert!(config::validate_date("2025-01-06").is_ok());
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants, client settings and validation
//! - [`types`]: Core data types (Agency, TitleSummary, RegulationRecord)
//! - [`error`]: Error types and Result alias
//! - [`http`]: HTTP client with retry and backoff
//! - [`agencies`]: Agency list and section ownership
//! - [`titles`]: Title summaries
//! - [`sections`]: Full-title XML and section extraction
//! - [`xml`]: XML utilities
//! - [`client`]: Paginated registry client
//! - [`output`]: JSON Lines output
//! - [`cli`]: Command-line interface

pub mod agencies;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod output;
pub mod sections;
pub mod titles;
pub mod types;
pub mod xml;

// Re-export commonly used items
pub use agencies::AgencyIndex;
pub use client::{Cursor, Page, Pages, RegistryClient, SectionRequest};
pub use config::{validate_date, validate_title, ClientConfig};
pub use error::{ErrorKind, HarvesterError, Result};
pub use types::{count_words, Agency, CfrReference, Hierarchy, RegulationRecord, TitleSummary};
