//! Full-title XML download and section extraction.
//!
//! Every `DIV*` element with `TYPE="SECTION"` becomes one
//! [`RegulationRecord`]. The enclosing subtitle, chapter, subchapter, part
//! and subpart are taken from the section's `DIV` ancestors.

use std::collections::HashSet;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use roxmltree::{Document, Node};

use crate::agencies::AgencyIndex;
use crate::config::{full_title_url, versions_url, ClientConfig};
use crate::error::{HarvesterError, Result};
use crate::http::{bytes_to_string, download_bytes};
use crate::types::{Hierarchy, RegulationRecord};
use crate::xml::{collect_text, div_type, find_child, find_children};

/// Sections extracted from one title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTitle {
    pub records: Vec<RegulationRecord>,
    /// Sections dropped because no agency claims their location.
    pub unowned: usize,
}

/// Download the full XML of a title as of `date`.
pub fn download_title_xml(
    client: &Client,
    config: &ClientConfig,
    title: u32,
    date: NaiveDate,
) -> Result<String> {
    let url = full_title_url(&config.base_url, date, title);
    let bytes = download_bytes(client, config, &url, "application/xml").map_err(|e| {
        if let HarvesterError::Http(source) = e {
            HarvesterError::TitleDownload {
                title,
                date: date.to_string(),
                source,
            }
        } else {
            e
        }
    })?;

    Ok(bytes_to_string(&bytes, &format!("title {title} XML")))
}

/// Parse the sections of a title document.
pub fn parse_sections(
    xml: &str,
    title: u32,
    date: NaiveDate,
    base_url: &str,
    owners: &AgencyIndex,
) -> Result<ParsedTitle> {
    let doc = Document::parse(xml)?;

    if !doc.descendants().any(|n| div_type(n) == Some("TITLE")) {
        return Err(HarvesterError::MissingElement {
            element: "DIV1 TYPE=\"TITLE\"".to_string(),
            context: format!("title {title}"),
        });
    }

    let mut parsed = ParsedTitle::default();
    let mut seen: HashSet<String> = HashSet::new();

    for node in doc
        .descendants()
        .filter(|n| div_type(*n) == Some("SECTION"))
    {
        let Some(section) = section_number(node) else {
            tracing::debug!(title, "skipping section without a number");
            continue;
        };

        let hierarchy = hierarchy_of(node, title);
        let Some(agency) = owners.owner(title, hierarchy.chapter.as_deref()) else {
            parsed.unowned += 1;
            continue;
        };

        let id = RegulationRecord::citation(title, &section);
        if !seen.insert(id.clone()) {
            tracing::debug!(%id, "duplicate section number, keeping first occurrence");
            continue;
        }

        let heading = find_child(node, "HEAD").map(collect_text).unwrap_or_default();
        let text = find_children(node, "P")
            .map(collect_text)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        parsed.records.push(RegulationRecord {
            id,
            agency: agency.to_string(),
            revision_ref: versions_url(base_url, title, &section),
            hierarchy,
            section,
            heading,
            text,
            effective_date: date,
        });
    }

    if parsed.unowned > 0 {
        tracing::info!(title, unowned = parsed.unowned, "sections without an owning agency");
    }

    Ok(parsed)
}

/// Section number from the `N` attribute, without the section sign.
fn section_number(node: Node<'_, '_>) -> Option<String> {
    let n = node.attribute("N")?;
    let number = n.trim_start_matches('§').trim();
    (!number.is_empty()).then(|| number.to_string())
}

fn hierarchy_of(node: Node<'_, '_>, title: u32) -> Hierarchy {
    let mut hierarchy = Hierarchy {
        title,
        ..Hierarchy::default()
    };

    for ancestor in node.ancestors().skip(1) {
        let Some(kind) = div_type(ancestor) else {
            continue;
        };
        let Some(n) = ancestor.attribute("N").map(|n| n.trim().to_string()) else {
            continue;
        };
        // Innermost ancestor wins; ancestors() walks outward.
        let slot = match kind {
            "SUBTITLE" => &mut hierarchy.subtitle,
            "CHAPTER" => &mut hierarchy.chapter,
            "SUBCHAP" => &mut hierarchy.subchapter,
            "PART" => &mut hierarchy.part,
            "SUBPART" => &mut hierarchy.subpart,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(n);
        }
    }

    hierarchy
}
