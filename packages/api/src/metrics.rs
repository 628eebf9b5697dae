//! Read-side queries over the warehouse.
//!
//! All functions are deterministic for a given store: every result set has a
//! total order.

use std::collections::BTreeMap;

use ecfr_pipeline::{RevisionEntry, Warehouse};
use sqlx::SqlitePool;

use crate::alignment::Alignment;
use crate::error::{ApiError, Result};
use crate::models::{
    AgencyMetrics, AgencySummary, ChartData, DateRange, Kpi, RefreshInfo, SearchHit, TableData,
    TableRow, TitleInfo,
};
use crate::words::WordCounter;

/// Maximum number of search hits returned.
pub const SEARCH_LIMIT: i64 = 50;
/// Number of words listed per agency in the table.
pub const TOP_WORDS: usize = 10;
const SNIPPET_CHARS: usize = 1000;

/// Case-insensitive substring match on heading and body; `?1` is the LIKE
/// pattern or NULL for no filter.
const MATCH_CLAUSE: &str =
    "(?1 IS NULL OR LOWER(r.heading || ' ' || r.body) LIKE ?1 ESCAPE '\\')";

/// LIKE pattern for a user search term, or `None` for an empty term.
pub fn like_pattern(search: Option<&str>) -> Option<String> {
    let term = search?.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

#[derive(Debug, sqlx::FromRow)]
struct AgencyText {
    slug: String,
    name: String,
    heading: String,
    body: String,
    word_count: i64,
}

pub async fn list_agencies(pool: &SqlitePool) -> Result<Vec<AgencySummary>> {
    let agencies = sqlx::query_as::<_, AgencySummary>(
        r#"
        SELECT a.slug, a.name, a.short_name, a.parent_slug,
               COUNT(r.id) AS record_count,
               COALESCE(SUM(r.word_count), 0) AS word_count
        FROM agencies a
        LEFT JOIN regulations r ON r.agency_slug = a.slug
        GROUP BY a.slug, a.name, a.short_name, a.parent_slug
        ORDER BY a.name, a.slug
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(agencies)
}

/// Title summaries from the last ingestion, by title number.
pub async fn list_titles(pool: &SqlitePool) -> Result<Vec<TitleInfo>> {
    let titles = sqlx::query_as::<_, TitleInfo>(
        r#"
        SELECT t.number, t.name, t.latest_amended_on, t.up_to_date_as_of, t.reserved,
               COUNT(r.id) AS section_count
        FROM titles t
        LEFT JOIN regulations r ON r.title = t.number
        GROUP BY t.number, t.name, t.latest_amended_on, t.up_to_date_as_of, t.reserved
        ORDER BY t.number
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(titles)
}

/// Resolve an agency by slug, falling back to its short name (`EPA`).
async fn find_agency(pool: &SqlitePool, key: &str) -> Result<(String, String)> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT slug, name FROM agencies
        WHERE slug = ?1 OR UPPER(short_name) = UPPER(?1)
        ORDER BY slug = ?1 DESC, slug
        LIMIT 1
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("agency '{key}'")))
}

/// Word count, change events and alignment for one agency.
#[tracing::instrument(skip(pool, alignment))]
pub async fn agency_metrics(
    pool: &SqlitePool,
    alignment: &Alignment,
    key: &str,
    range: DateRange,
) -> Result<AgencyMetrics> {
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(ApiError::BadRequest(format!(
                "'from' ({from}) is after 'to' ({to})"
            )));
        }
    }

    let (slug, name) = find_agency(pool, key).await?;

    let (record_count, word_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(word_count), 0)
        FROM regulations
        WHERE agency_slug = ?
        "#,
    )
    .bind(&slug)
    .fetch_one(pool)
    .await?;

    let changes = sqlx::query_as::<_, RevisionEntry>(
        r#"
        SELECT record_id, seq, recorded_on, kind, delta_chars, agency_slug
        FROM revisions
        WHERE agency_slug = ?1
          AND (?2 IS NULL OR recorded_on >= ?2)
          AND (?3 IS NULL OR recorded_on <= ?3)
        ORDER BY recorded_on, record_id, seq
        "#,
    )
    .bind(&slug)
    .bind(range.from)
    .bind(range.to)
    .fetch_all(pool)
    .await?;

    let alignment_score = if alignment.is_enabled() {
        let texts: Vec<String> = sqlx::query_scalar(
            "SELECT heading || ' ' || body FROM regulations WHERE agency_slug = ? ORDER BY id",
        )
        .bind(&slug)
        .fetch_all(pool)
        .await?;
        alignment.score(&texts.join(" "))
    } else {
        None
    };

    Ok(AgencyMetrics {
        agency: slug,
        name,
        range,
        record_count,
        word_count,
        changes,
        alignment_score,
    })
}

async fn agency_texts(pool: &SqlitePool, pattern: Option<&str>) -> Result<Vec<AgencyText>> {
    let sql = format!(
        r#"
        SELECT r.agency_slug AS slug, COALESCE(a.name, r.agency_slug) AS name,
               r.heading, r.body, r.word_count
        FROM regulations r
        LEFT JOIN agencies a ON a.slug = r.agency_slug
        WHERE {MATCH_CLAUSE}
        ORDER BY r.agency_slug, r.id
        "#
    );
    let rows = sqlx::query_as::<_, AgencyText>(&sql)
        .bind(pattern)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Overview KPIs: section count, word count, change rate, alignment.
///
/// Change rate is amendments per matching section. Alignment is the mean of
/// the per-agency scores.
#[tracing::instrument(skip(pool, alignment))]
pub async fn kpis(
    pool: &SqlitePool,
    alignment: &Alignment,
    search: Option<&str>,
) -> Result<Vec<Kpi>> {
    let pattern = like_pattern(search);

    let (sections, words): (i64, i64) = sqlx::query_as(&format!(
        "SELECT COUNT(*), COALESCE(SUM(r.word_count), 0) FROM regulations r WHERE {MATCH_CLAUSE}"
    ))
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    let amendments: i64 = sqlx::query_scalar(&format!(
        r#"
        SELECT COUNT(*) FROM revisions v
        JOIN regulations r ON r.id = v.record_id
        WHERE v.kind = 'amended' AND {MATCH_CLAUSE}
        "#
    ))
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    let change_rate = if sections == 0 {
        0.0
    } else {
        amendments as f64 / sections as f64
    };

    let alignment_score = if alignment.is_enabled() {
        let mut per_agency: BTreeMap<String, String> = BTreeMap::new();
        for row in agency_texts(pool, pattern.as_deref()).await? {
            let text = per_agency.entry(row.slug).or_default();
            text.push_str(&row.heading);
            text.push(' ');
            text.push_str(&row.body);
            text.push(' ');
        }
        let scores: Vec<f64> = per_agency
            .values()
            .filter_map(|text| alignment.score(text))
            .collect();
        (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64)
    } else {
        None
    };

    Ok(vec![
        Kpi {
            metric: "Section Count".to_string(),
            value: Some(sections as f64),
        },
        Kpi {
            metric: "Word Count".to_string(),
            value: Some(words as f64),
        },
        Kpi {
            metric: "Change Rate".to_string(),
            value: Some(change_rate),
        },
        Kpi {
            metric: "Alignment Score".to_string(),
            value: alignment_score,
        },
    ])
}

/// Section counts per agency, largest first.
pub async fn chart(pool: &SqlitePool, search: Option<&str>) -> Result<ChartData> {
    let pattern = like_pattern(search);
    let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
        r#"
        SELECT COALESCE(a.name, r.agency_slug) AS name, COUNT(*) AS sections
        FROM regulations r
        LEFT JOIN agencies a ON a.slug = r.agency_slug
        WHERE {MATCH_CLAUSE}
        GROUP BY r.agency_slug, a.name
        ORDER BY sections DESC, name
        "#
    ))
    .bind(pattern.as_deref())
    .fetch_all(pool)
    .await?;

    let (labels, values) = rows
        .into_iter()
        .map(|(name, count)| (name, count as f64))
        .unzip();
    Ok(ChartData { labels, values })
}

/// Per-agency word counts and top words, by word count descending.
pub async fn table(pool: &SqlitePool, search: Option<&str>) -> Result<TableData> {
    struct Acc {
        name: String,
        word_count: i64,
        documents: i64,
        words: WordCounter,
    }

    let pattern = like_pattern(search);
    let mut by_agency: BTreeMap<String, Acc> = BTreeMap::new();

    for row in agency_texts(pool, pattern.as_deref()).await? {
        let acc = by_agency.entry(row.slug).or_insert_with(|| Acc {
            name: row.name.clone(),
            word_count: 0,
            documents: 0,
            words: WordCounter::default(),
        });
        acc.word_count += row.word_count;
        acc.documents += 1;
        acc.words.add_text(&row.heading);
        acc.words.add_text(&row.body);
    }

    let mut data: Vec<TableRow> = by_agency
        .into_iter()
        .map(|(slug, acc)| TableRow {
            agency: acc.name,
            slug,
            word_count: acc.word_count,
            top_words: acc
                .words
                .top(TOP_WORDS)
                .into_iter()
                .map(|(word, count)| format!("{word} ({count})"))
                .collect(),
            document_count: acc.documents,
        })
        .collect();
    data.sort_by(|a, b| {
        b.word_count
            .cmp(&a.word_count)
            .then_with(|| a.agency.cmp(&b.agency))
    });

    Ok(TableData { data })
}

#[derive(Debug, sqlx::FromRow)]
struct SearchRow {
    id: String,
    slug: String,
    name: String,
    heading: String,
    body: String,
}

/// Sections whose heading or body contains `query`, at most [`SEARCH_LIMIT`].
#[tracing::instrument(skip(pool))]
pub async fn search(pool: &SqlitePool, query: Option<&str>) -> Result<Vec<SearchHit>> {
    let pattern = like_pattern(query);
    let rows = sqlx::query_as::<_, SearchRow>(&format!(
        r#"
        SELECT r.id, r.agency_slug AS slug, COALESCE(a.name, r.agency_slug) AS name,
               r.heading, r.body
        FROM regulations r
        LEFT JOIN agencies a ON a.slug = r.agency_slug
        WHERE {MATCH_CLAUSE}
        ORDER BY r.id
        LIMIT ?2
        "#
    ))
    .bind(pattern.as_deref())
    .bind(SEARCH_LIMIT)
    .fetch_all(pool)
    .await?;

    let hits = rows
        .into_iter()
        .zip(1..)
        .map(|(row, rank)| {
            let text = format!("{} {}", row.heading, row.body);
            SearchHit {
                id: rank,
                title: format!("Section {} from {}", row.id, row.name),
                record_id: row.id,
                agency: row.name,
                agency_slug: row.slug,
                snippet: text.chars().take(SNIPPET_CHARS).collect(),
            }
        })
        .collect();
    Ok(hits)
}

/// Outcome of the most recent ingestion run.
pub async fn refresh_info(pool: &SqlitePool) -> Result<RefreshInfo> {
    let run = Warehouse::from_pool(pool.clone()).latest_run().await?;
    let info = match run {
        Some(run) => RefreshInfo {
            detail: format!("Last ingestion {} ({} records)", run.status, run.record_count),
            last_refreshed: run.finished_at,
            run: Some(run),
        },
        None => RefreshInfo {
            detail: "No ingestion has run yet".to_string(),
            last_refreshed: None,
            run: None,
        },
    };
    Ok(info)
}
