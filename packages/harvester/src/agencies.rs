//! Agency list download and ownership resolution.
//!
//! The admin API lists agencies with nested sub-agencies. Each agency names
//! the CFR titles and chapters it is responsible for; [`AgencyIndex`] turns
//! those references into a single owner per section.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::{agencies_url, ClientConfig};
use crate::error::{HarvesterError, Result};
use crate::http::{bytes_to_string, download_bytes};
use crate::types::{Agency, CfrReference};

#[derive(Deserialize)]
struct AgenciesResponse {
    agencies: Vec<ApiAgency>,
}

#[derive(Deserialize)]
struct ApiAgency {
    slug: String,
    name: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    children: Vec<ApiAgency>,
    #[serde(default)]
    cfr_references: Vec<CfrReference>,
}

/// Download and parse the agency list.
pub fn download_agencies(client: &Client, config: &ClientConfig) -> Result<Vec<Agency>> {
    let url = agencies_url(&config.base_url);
    let bytes = download_bytes(client, config, &url, "application/json").map_err(|e| {
        if let HarvesterError::Http(source) = e {
            HarvesterError::AgenciesDownload { source }
        } else {
            e
        }
    })?;

    parse_agencies(&bytes_to_string(&bytes, "agency list"))
}

/// Parse the agency list JSON, flattening sub-agencies after their parent.
pub fn parse_agencies(json: &str) -> Result<Vec<Agency>> {
    let response: AgenciesResponse =
        serde_json::from_str(json).map_err(|source| HarvesterError::Json {
            resource: "agencies".to_string(),
            source,
        })?;

    let mut agencies = Vec::new();
    for agency in response.agencies {
        flatten(agency, None, &mut agencies);
    }
    Ok(agencies)
}

fn flatten(agency: ApiAgency, parent_slug: Option<&str>, out: &mut Vec<Agency>) {
    let ApiAgency {
        slug,
        name,
        short_name,
        children,
        cfr_references,
    } = agency;

    out.push(Agency {
        slug: slug.clone(),
        name,
        short_name: short_name.filter(|s| !s.trim().is_empty()),
        parent_slug: parent_slug.map(str::to_string),
        cfr_references,
    });

    for child in children {
        flatten(child, Some(&slug), out);
    }
}

/// Lookup from CFR location to owning agency slug.
#[derive(Debug, Clone, Default)]
pub struct AgencyIndex {
    by_chapter: BTreeMap<(u32, String), String>,
    by_title: BTreeMap<u32, String>,
}

impl AgencyIndex {
    /// Build the index. When several agencies claim the same location the
    /// lexicographically smallest slug wins.
    pub fn new(agencies: &[Agency]) -> Self {
        let mut index = Self::default();
        for agency in agencies {
            for reference in &agency.cfr_references {
                let slot = match &reference.chapter {
                    Some(chapter) => index
                        .by_chapter
                        .entry((reference.title, chapter.clone()))
                        .or_insert_with(|| agency.slug.clone()),
                    None => index
                        .by_title
                        .entry(reference.title)
                        .or_insert_with(|| agency.slug.clone()),
                };
                if agency.slug < *slot {
                    *slot = agency.slug.clone();
                }
            }
        }
        index
    }

    /// Resolve the owner of a section. A chapter match beats a title match.
    pub fn owner(&self, title: u32, chapter: Option<&str>) -> Option<&str> {
        chapter
            .and_then(|c| self.by_chapter.get(&(title, c.to_string())))
            .or_else(|| self.by_title.get(&title))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_chapter.is_empty() && self.by_title.is_empty()
    }
}
