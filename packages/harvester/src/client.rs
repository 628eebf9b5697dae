//! Registry client that ties the download and parse steps together.
//!
//! Section data is paginated by title: page `k` of a [`SectionRequest`] is the
//! full text of the request's `k`-th title. A [`Page`] carries the cursor of
//! the next page, or `None` once the last title has been read.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::agencies::{download_agencies, AgencyIndex};
use crate::config::ClientConfig;
use crate::error::{HarvesterError, Result};
use crate::http::create_client;
use crate::sections::{download_title_xml, parse_sections};
use crate::titles::download_titles;
use crate::types::{Agency, RegulationRecord, TitleSummary};

/// Which titles to read, as of which date, and who owns what.
#[derive(Debug, Clone)]
pub struct SectionRequest {
    pub date: NaiveDate,
    pub titles: Vec<u32>,
    pub owners: AgencyIndex,
}

impl SectionRequest {
    pub fn new(date: NaiveDate, titles: Vec<u32>, owners: AgencyIndex) -> Self {
        Self {
            date,
            titles,
            owners,
        }
    }

    pub fn page_count(&self) -> usize {
        self.titles.len()
    }

    /// Cursor of the page that follows `cursor`, or `None` past the last page.
    ///
    /// Lets a caller move on after a page failed and carried no `next`.
    pub fn cursor_after(&self, cursor: Option<Cursor>) -> Option<Cursor> {
        let next = cursor.map_or(1, |c| c.0 + 1);
        (next < self.page_count()).then_some(Cursor(next))
    }
}

/// Opaque continuation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(usize);

impl Cursor {
    pub fn position(self) -> usize {
        self.0
    }
}

/// One page of section records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: u32,
    pub records: Vec<RegulationRecord>,
    pub unowned: usize,
    /// Cursor of the following page; `None` signals end of data.
    pub next: Option<Cursor>,
}

/// Blocking client for the eCFR registry.
pub struct RegistryClient {
    client: Client,
    config: ClientConfig,
}

impl RegistryClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = create_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the flattened agency list.
    pub fn agencies(&self) -> Result<Vec<Agency>> {
        download_agencies(&self.client, &self.config)
    }

    /// Fetch the CFR title summaries.
    pub fn titles(&self) -> Result<Vec<TitleSummary>> {
        download_titles(&self.client, &self.config)
    }

    /// Fetch one page of section records.
    ///
    /// `None` starts at the first page.
    pub fn fetch_page(&self, request: &SectionRequest, cursor: Option<Cursor>) -> Result<Page> {
        let position = cursor.map_or(0, Cursor::position);
        let title = *request
            .titles
            .get(position)
            .ok_or(HarvesterError::InvalidCursor {
                position,
                pages: request.page_count(),
            })?;

        tracing::info!(
            title,
            date = %request.date,
            page = position + 1,
            pages = request.page_count(),
            "fetching title"
        );

        let xml = download_title_xml(&self.client, &self.config, title, request.date)?;
        let parsed = parse_sections(
            &xml,
            title,
            request.date,
            &self.config.base_url,
            &request.owners,
        )?;

        let next = request.cursor_after(Some(Cursor(position)));

        Ok(Page {
            title,
            records: parsed.records,
            unowned: parsed.unowned,
            next,
        })
    }

    /// Iterate over every page of a request.
    ///
    /// A failed page is yielded as an error and iteration moves on to the
    /// next title, so callers decide whether to skip or abort.
    pub fn pages<'a>(&'a self, request: &'a SectionRequest) -> Pages<'a> {
        Pages {
            client: self,
            request,
            position: 0,
        }
    }
}

/// Iterator returned by [`RegistryClient::pages`].
pub struct Pages<'a> {
    client: &'a RegistryClient,
    request: &'a SectionRequest,
    position: usize,
}

impl Iterator for Pages<'_> {
    /// Title number of the page and its outcome.
    type Item = (u32, Result<Page>);

    fn next(&mut self) -> Option<Self::Item> {
        let title = *self.request.titles.get(self.position)?;
        let cursor = Cursor(self.position);
        self.position += 1;
        Some((title, self.client.fetch_page(self.request, Some(cursor))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.request.page_count().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_page_rejects_cursor_past_end() {
        let client = RegistryClient::new(ClientConfig::default()).unwrap();
        let request = SectionRequest::new(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            vec![],
            AgencyIndex::default(),
        );

        let err = client.fetch_page(&request, None).unwrap_err();
        assert!(matches!(
            err,
            HarvesterError::InvalidCursor {
                position: 0,
                pages: 0
            }
        ));
    }

    #[test]
    fn test_cursor_after() {
        let request = SectionRequest::new(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            vec![1, 40, 49],
            AgencyIndex::default(),
        );

        let second = request.cursor_after(None).unwrap();
        assert_eq!(second.position(), 1);
        let third = request.cursor_after(Some(second)).unwrap();
        assert_eq!(third.position(), 2);
        assert!(request.cursor_after(Some(third)).is_none());
    }

    #[test]
    fn test_pages_empty_request() {
        let client = RegistryClient::new(ClientConfig::default()).unwrap();
        let request = SectionRequest::new(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            vec![],
            AgencyIndex::default(),
        );

        let mut pages = client.pages(&request);
        assert_eq!(pages.size_hint(), (0, Some(0)));
        assert!(pages.next().is_none());
    }
}
