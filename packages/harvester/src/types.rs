//! Core data types for the harvester.
//!
//! These types represent eCFR registry entities: agencies, titles and
//! the section-level regulation records the warehouse stores.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A CFR location an agency is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfrReference {
    pub title: u32,

    /// Chapter within the title; `None` means the whole title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

/// A federal agency as listed by the eCFR admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    /// eCFR slug (e.g., "environmental-protection-agency").
    pub slug: String,

    /// Display name.
    pub name: String,

    /// Abbreviation (e.g., "EPA"), when eCFR provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    /// Slug of the parent agency for sub-agencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_slug: Option<String>,

    #[serde(default)]
    pub cfr_references: Vec<CfrReference>,
}

/// Summary of one CFR title from the versioner API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleSummary {
    pub number: u32,
    pub name: String,
    #[serde(default)]
    pub latest_amended_on: Option<NaiveDate>,
    #[serde(default)]
    pub latest_issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub up_to_date_as_of: Option<NaiveDate>,
    #[serde(default)]
    pub reserved: bool,
}

/// Position of a section within the CFR hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub title: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subchapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpart: Option<String>,
}

/// One CFR section as fetched from the registry.
///
/// Records are immutable snapshots: a re-fetch produces a new record that
/// supersedes the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulationRecord {
    /// CFR citation, e.g. "40 CFR 1.1".
    pub id: String,

    /// Slug of the owning agency.
    pub agency: String,

    pub hierarchy: Hierarchy,

    /// Section number without the section sign (e.g., "1.1").
    pub section: String,

    /// Section heading (the `HEAD` element).
    pub heading: String,

    /// Body paragraphs joined by a single space.
    pub text: String,

    /// Date of the registry snapshot this record was taken from.
    pub effective_date: NaiveDate,

    /// URL of the section's version history.
    pub revision_ref: String,
}

impl RegulationRecord {
    /// Build the record identifier from a title and section number.
    ///
    /// # Examples
    /// ```
    /// use ecfr_harvester::types::RegulationRecord;
    ///
    /// assert_eq!(RegulationRecord::citation(40, "1.1"), "40 CFR 1.1");
    /// ```
    #[must_use]
    pub fn citation(title: u32, section: &str) -> String {
        format!("{title} CFR {section}")
    }

    /// Heading and body as one string.
    #[must_use]
    pub fn full_text(&self) -> String {
        match (self.heading.is_empty(), self.text.is_empty()) {
            (true, _) => self.text.clone(),
            (false, true) => self.heading.clone(),
            (false, false) => format!("{} {}", self.heading, self.text),
        }
    }

    /// Number of whitespace-separated words in heading and body.
    #[must_use]
    pub fn word_count(&self) -> usize {
        count_words(&self.heading) + count_words(&self.text)
    }
}

/// Count whitespace-separated words.
///
/// # Examples
/// ```
/// use ecfr_harvester::types::count_words;
///
/// assert_eq!(count_words("  Definitions.  As used in this part "), 6);
/// assert_eq!(count_words(""), 0);
/// ```
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
