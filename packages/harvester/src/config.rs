//! Configuration constants, client settings and validation functions.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{HarvesterError, Result};

/// Base URL of the public eCFR API.
pub const ECFR_API_BASE: &str = "https://www.ecfr.gov/api";

/// HTTP timeout in seconds.
///
/// Full-title XML documents run to tens of megabytes, so this is generous.
pub const HTTP_TIMEOUT_SECS: u64 = 60;

/// Maximum number of attempts for transient failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound on attempts; beyond this the backoff delay is measured in days.
pub const MAX_ATTEMPTS_CAP: u32 = 10;

/// Base delay for exponential backoff (milliseconds).
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Highest CFR title number.
pub const MAX_TITLE: u32 = 50;

/// Date pattern: YYYY-MM-DD.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

/// Settings for [`crate::RegistryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL without trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: ECFR_API_BASE.to_string(),
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.clamp(1, MAX_ATTEMPTS_CAP);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }
}

/// Validate a CFR title number.
///
/// # Examples
/// ```
/// use ecfr_harvester::config::validate_title;
///
/// assert_eq!(validate_title("40").unwrap(), 40);
/// assert!(validate_title("0").is_err());
/// assert!(validate_title("title-1").is_err());
/// ```
pub fn validate_title(title: &str) -> Result<u32> {
    match title.trim().parse::<u32>() {
        Ok(n) if (1..=MAX_TITLE).contains(&n) => Ok(n),
        _ => Err(HarvesterError::InvalidTitle(title.to_string())),
    }
}

/// Validate date format (YYYY-MM-DD) and return the parsed date.
///
/// Rejects dates in the future since eCFR has no snapshot for them.
///
/// # Examples
/// ```
/// use ecfr_harvester::config::validate_date;
///
/// assert!(validate_date("2025-01-06").is_ok());
/// assert!(validate_date("invalid").is_err());
/// assert!(validate_date("2025-13-01").is_err()); // Invalid month
/// ```
pub fn validate_date(date_str: &str) -> Result<NaiveDate> {
    if !DATE_PATTERN.is_match(date_str) {
        return Err(HarvesterError::InvalidDate(date_str.to_string()));
    }

    let parsed_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| HarvesterError::InvalidDate(date_str.to_string()))?;

    let today = chrono::Local::now().date_naive();
    if parsed_date > today {
        return Err(HarvesterError::InvalidDate(format!(
            "{date_str} is in the future (today is {today})"
        )));
    }

    Ok(parsed_date)
}

/// Build the agency list URL.
pub fn agencies_url(base_url: &str) -> String {
    format!("{base_url}/admin/v1/agencies.json")
}

/// Build the title summary URL.
pub fn titles_url(base_url: &str) -> String {
    format!("{base_url}/versioner/v1/titles.json")
}

/// Build the full-text XML URL for a title as of a date.
pub fn full_title_url(base_url: &str, date: NaiveDate, title: u32) -> String {
    debug_assert!(
        (1..=MAX_TITLE).contains(&title),
        "title should be validated before calling full_title_url"
    );
    format!(
        "{base_url}/versioner/v1/full/{}/title-{title}.xml",
        date.format("%Y-%m-%d")
    )
}

/// Build the version-history URL for one section.
///
/// This is the revision history reference stored on every record.
pub fn versions_url(base_url: &str, title: u32, section: &str) -> String {
    let section: String = section
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    format!("{base_url}/versioner/v1/versions/title-{title}.json?section={section}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title_valid() {
        assert_eq!(validate_title("1").unwrap(), 1);
        assert_eq!(validate_title("50").unwrap(), 50);
        assert_eq!(validate_title(" 12 ").unwrap(), 12);
    }

    #[test]
    fn test_validate_title_invalid() {
        assert!(validate_title("").is_err());
        assert!(validate_title("0").is_err());
        assert!(validate_title("51").is_err());
        assert!(validate_title("-3").is_err());
        assert!(validate_title("XL").is_err());
    }

    #[test]
    fn test_validate_date_valid() {
        assert_eq!(
            validate_date("2025-01-06").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
        );
        assert!(validate_date("2000-06-15").is_ok());
    }

    #[test]
    fn test_validate_date_invalid_format() {
        assert!(validate_date("").is_err());
        assert!(validate_date("2025/01/01").is_err());
        assert!(validate_date("01-06-2025").is_err());
        assert!(validate_date("2025-1-6").is_err());
    }

    #[test]
    fn test_validate_date_invalid_date() {
        assert!(validate_date("2025-13-01").is_err());
        assert!(validate_date("2025-02-30").is_err());
    }

    #[test]
    fn test_validate_date_future() {
        let err = validate_date("2999-01-01").unwrap_err();
        assert!(err.to_string().contains("in the future"));
    }

    #[test]
    fn test_urls() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        assert_eq!(
            agencies_url(ECFR_API_BASE),
            "https://www.ecfr.gov/api/admin/v1/agencies.json"
        );
        assert_eq!(
            titles_url(ECFR_API_BASE),
            "https://www.ecfr.gov/api/versioner/v1/titles.json"
        );
        assert_eq!(
            full_title_url(ECFR_API_BASE, date, 40),
            "https://www.ecfr.gov/api/versioner/v1/full/2025-01-06/title-40.xml"
        );
    }

    #[test]
    fn test_versions_url_sanitizes_section() {
        assert_eq!(
            versions_url(ECFR_API_BASE, 40, "1.1"),
            "https://www.ecfr.gov/api/versioner/v1/versions/title-40.json?section=1.1"
        );
        assert_eq!(
            versions_url("http://x", 1, "1.1&part=<2>"),
            "http://x/versioner/v1/versions/title-1.json?section=1.1part2"
        );
    }

    #[test]
    fn test_client_config_builders() {
        let config = ClientConfig::default()
            .with_base_url("http://127.0.0.1:9000/")
            .with_max_attempts(0)
            .with_retry_base_delay(Duration::from_millis(1));

        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.retry_base_delay, Duration::from_millis(1));
        assert_eq!(config.timeout, Duration::from_secs(HTTP_TIMEOUT_SECS));
    }

    #[test]
    fn test_max_attempts_is_capped() {
        let config = ClientConfig::default().with_max_attempts(40);
        assert_eq!(config.max_attempts, MAX_ATTEMPTS_CAP);
    }
}
