//! Error types for the harvester.
//!
//! `HarvesterError` carries the detailed context; [`ErrorKind`] collapses it
//! into the coarse classes callers branch on (retry, skip the page, abort).

use thiserror::Error;

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Title number outside the CFR range.
    #[error("Invalid CFR title: '{0}'. Expected a number between 1 and 50")]
    InvalidTitle(String),

    /// Invalid date format.
    #[error("Invalid date format: '{0}'. Expected YYYY-MM-DD (e.g., 2025-01-06)")]
    InvalidDate(String),

    /// Cursor does not point into the request's page list.
    #[error("Cursor position {position} is past the last page ({pages} pages)")]
    InvalidCursor { position: usize, pages: usize },

    /// HTTP request failed without being retried (4xx, invalid URL).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transient failures persisted through every attempt.
    #[error("Request to {url} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        message: String,
    },

    /// Failed to download the agency list.
    #[error("Failed to download agencies: {source}")]
    AgenciesDownload {
        #[source]
        source: reqwest::Error,
    },

    /// Failed to download the full XML of a title.
    #[error("Failed to download title {title} at date {date}: {source}")]
    TitleDownload {
        title: u32,
        date: String,
        #[source]
        source: reqwest::Error,
    },

    /// JSON payload did not match the expected shape.
    #[error("Malformed JSON from {resource}: {source}")]
    Json {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// Document parsed but lacks a required element.
    #[error("Missing required XML element: {element} in {context}")]
    MissingElement { element: String, context: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by the ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure; retryable upstream, fatal once retries are spent.
    Network,
    /// Malformed upstream payload; fatal for the affected page only.
    Parse,
    /// Caller supplied a bad title, date or cursor.
    InvalidInput,
    /// Local filesystem failure.
    Io,
}

impl HarvesterError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTitle(_) | Self::InvalidDate(_) | Self::InvalidCursor { .. } => {
                ErrorKind::InvalidInput
            }
            Self::Http(_)
            | Self::RetriesExhausted { .. }
            | Self::AgenciesDownload { .. }
            | Self::TitleDownload { .. } => ErrorKind::Network,
            Self::Json { .. } | Self::XmlParse(_) | Self::MissingElement { .. } => {
                ErrorKind::Parse
            }
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the failure only spoils the page it occurred on.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarvesterError::InvalidTitle("51".to_string());
        assert!(err.to_string().contains("51"));
        assert!(err.to_string().contains("between 1 and 50"));
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = HarvesterError::RetriesExhausted {
            url: "https://example.test/x".to_string(),
            attempts: 3,
            message: "Server error: 503".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request to https://example.test/x failed after 3 attempts: Server error: 503"
        );
    }

    #[test]
    fn test_kind_classification() {
        let parse = HarvesterError::MissingElement {
            element: "DIV1".to_string(),
            context: "title 1".to_string(),
        };
        assert_eq!(parse.kind(), ErrorKind::Parse);
        assert!(parse.is_parse());

        let network = HarvesterError::RetriesExhausted {
            url: String::new(),
            attempts: 3,
            message: String::new(),
        };
        assert_eq!(network.kind(), ErrorKind::Network);
        assert!(!network.is_parse());

        let invalid = HarvesterError::InvalidCursor {
            position: 4,
            pages: 2,
        };
        assert_eq!(invalid.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_json_error_is_parse() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = HarvesterError::Json {
            resource: "agencies".to_string(),
            source,
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().starts_with("Malformed JSON from agencies"));
    }
}
