//! HTTP client wrapper for downloading from the eCFR registry.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::config::ClientConfig;
use crate::error::{HarvesterError, Result};

/// User agent string identifying this harvester.
const USER_AGENT: &str = concat!("ecfr-harvester/", env!("CARGO_PKG_VERSION"));

/// Create a configured HTTP client.
pub fn create_client(config: &ClientConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Delay before retry number `attempt` (1-based): base, 2x base, 4x base, ...
///
/// Saturates instead of overflowing for large attempt counts.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Whether a transport error is worth another attempt.
///
/// Covers failures while connecting as well as a body that was cut off or
/// stalled mid-read; the latter surface as body or decode errors.
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_body() || error.is_decode()
}

/// Download content from a URL with retry logic.
///
/// Uses exponential backoff for transient failures (connect/timeout errors,
/// truncated bodies, 5xx and 429 responses). Other client errors are
/// returned immediately.
pub fn download_bytes(
    client: &Client,
    config: &ClientConfig,
    url: &str,
    accept: &str,
) -> Result<Vec<u8>> {
    let mut last_error: Option<String> = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            let delay = backoff_delay(config.retry_base_delay, attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after delay");
            thread::sleep(delay);
        }

        let response = match client.get(url).header("Accept", accept).send() {
            Ok(response) => response,
            Err(e) if is_transient(&e) => {
                tracing::warn!(
                    error = %e,
                    url,
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    "Connection error, will retry"
                );
                last_error = Some(e.to_string());
                continue;
            }
            Err(e) => return Err(HarvesterError::Http(e)),
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(
                status = %status,
                url,
                attempt = attempt + 1,
                max_attempts = config.max_attempts,
                "Transient HTTP status, will retry"
            );
            last_error = Some(format!("Server error: {status}"));
            continue;
        }

        let response = response.error_for_status()?;
        match response.bytes() {
            Ok(bytes) => return Ok(bytes.to_vec()),
            Err(e) if is_transient(&e) => {
                tracing::warn!(
                    error = %e,
                    url,
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    "Response body interrupted, will retry"
                );
                last_error = Some(e.to_string());
            }
            Err(e) => return Err(HarvesterError::Http(e)),
        }
    }

    Err(HarvesterError::RetriesExhausted {
        url: url.to_string(),
        attempts: config.max_attempts,
        message: last_error.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Decode a response body as UTF-8, replacing invalid sequences.
pub fn bytes_to_string(bytes: &[u8], context: &str) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) => {
            tracing::warn!(context, error = %e, "Response is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        let client = create_client(&ClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 34), base.saturating_mul(u32::MAX));
        assert_eq!(backoff_delay(base, u32::MAX), base.saturating_mul(u32::MAX));
    }

    #[test]
    fn test_bytes_to_string_valid() {
        assert_eq!(bytes_to_string("§ 1.1".as_bytes(), "test"), "§ 1.1");
    }

    #[test]
    fn test_bytes_to_string_lossy() {
        let text = bytes_to_string(&[b'a', 0xff, b'b'], "test");
        assert_eq!(text, "a\u{fffd}b");
    }
}
