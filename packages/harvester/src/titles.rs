//! CFR title summaries from the versioner API.

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::{titles_url, ClientConfig};
use crate::error::{HarvesterError, Result};
use crate::http::{bytes_to_string, download_bytes};
use crate::types::TitleSummary;

#[derive(Deserialize)]
struct TitlesResponse {
    titles: Vec<TitleSummary>,
}

/// Download and parse the list of CFR titles.
pub fn download_titles(client: &Client, config: &ClientConfig) -> Result<Vec<TitleSummary>> {
    let url = titles_url(&config.base_url);
    let bytes = download_bytes(client, config, &url, "application/json")?;
    parse_titles(&bytes_to_string(&bytes, "title list"))
}

/// Parse the titles JSON.
pub fn parse_titles(json: &str) -> Result<Vec<TitleSummary>> {
    let response: TitlesResponse =
        serde_json::from_str(json).map_err(|source| HarvesterError::Json {
            resource: "titles".to_string(),
            source,
        })?;
    Ok(response.titles)
}

/// Numbers of the titles that carry text, in ascending order.
pub fn active_titles(titles: &[TitleSummary]) -> Vec<u32> {
    let mut numbers: Vec<u32> = titles
        .iter()
        .filter(|t| !t.reserved)
        .map(|t| t.number)
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}
