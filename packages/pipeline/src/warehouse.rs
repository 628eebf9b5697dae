//! Local regulation warehouse.
//!
//! Records are keyed by CFR citation and replaced wholesale per title. Every
//! insert, text change and disappearance appends a [`RevisionEntry`], so the
//! change history outlives the records it describes.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use ecfr_harvester::{Agency, RegulationRecord, TitleSummary};
use sha2::{Digest, Sha256};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::db;
use crate::error::{PipelineError, Result};
use crate::models::{ChangeKind, IngestRun, IngestStatus, LoadSummary, RevisionEntry, RunOutcome};

/// Rows hashed by [`Warehouse::snapshot_digest`], in key order. The run log
/// is left out since it records when a load happened, not what was loaded.
const DIGEST_QUERIES: [(&str, &str); 6] = [
    (
        "agencies",
        "SELECT quote(slug) || ',' || quote(name) || ',' || quote(short_name) || ',' || \
         quote(parent_slug) FROM agencies ORDER BY slug",
    ),
    (
        "agency_references",
        "SELECT quote(agency_slug) || ',' || quote(title) || ',' || quote(chapter) \
         FROM agency_references ORDER BY agency_slug, title, chapter",
    ),
    (
        "regulations",
        "SELECT quote(id) || ',' || quote(agency_slug) || ',' || quote(title) || ',' || \
         quote(subtitle) || ',' || quote(chapter) || ',' || quote(subchapter) || ',' || \
         quote(part) || ',' || quote(subpart) || ',' || quote(section) || ',' || \
         quote(heading) || ',' || quote(body) || ',' || quote(word_count) || ',' || \
         quote(effective_date) || ',' || quote(revision_ref) FROM regulations ORDER BY id",
    ),
    (
        "revisions",
        "SELECT quote(record_id) || ',' || quote(seq) || ',' || quote(recorded_on) || ',' || \
         quote(kind) || ',' || quote(delta_chars) || ',' || quote(agency_slug) \
         FROM revisions ORDER BY record_id, seq",
    ),
    (
        "title_snapshots",
        "SELECT quote(title) || ',' || quote(effective_date) || ',' || quote(record_count) \
         FROM title_snapshots ORDER BY title",
    ),
    (
        "titles",
        "SELECT quote(number) || ',' || quote(name) || ',' || quote(latest_amended_on) || ',' || \
         quote(latest_issue_date) || ',' || quote(up_to_date_as_of) || ',' || quote(reserved) \
         FROM titles ORDER BY number",
    ),
];

#[derive(Debug, sqlx::FromRow)]
struct StoredText {
    id: String,
    heading: String,
    body: String,
    agency_slug: String,
}

pub struct Warehouse {
    pool: SqlitePool,
}

impl Warehouse {
    /// Open (or create) the store and bring its schema up to date.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::create_pool(config).await?;
        db::run_migrations(&pool).await?;
        tracing::info!(path = %config.db_path.display(), "warehouse opened");
        Ok(Self { pool })
    }

    /// Wrap a pool whose schema is already migrated.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Replace the agency list and its CFR references.
    #[tracing::instrument(skip(self, agencies), fields(agencies = agencies.len()))]
    pub async fn load_agencies(&self, agencies: &[Agency]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM agency_references")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM agencies").execute(&mut *tx).await?;

        let mut seen: HashSet<&str> = HashSet::new();
        for agency in agencies {
            if !seen.insert(agency.slug.as_str()) {
                tracing::debug!(slug = %agency.slug, "duplicate agency, keeping first");
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO agencies (slug, name, short_name, parent_slug)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&agency.slug)
            .bind(&agency.name)
            .bind(agency.short_name.as_deref())
            .bind(agency.parent_slug.as_deref())
            .execute(&mut *tx)
            .await?;

            for reference in &agency.cfr_references {
                sqlx::query(
                    "INSERT INTO agency_references (agency_slug, title, chapter) VALUES (?, ?, ?)",
                )
                .bind(&agency.slug)
                .bind(i64::from(reference.title))
                .bind(reference.chapter.as_deref())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(seen.len())
    }

    /// Replace the CFR title summaries.
    #[tracing::instrument(skip(self, titles), fields(titles = titles.len()))]
    pub async fn load_titles(&self, titles: &[TitleSummary]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM titles").execute(&mut *tx).await?;

        let mut seen: HashSet<u32> = HashSet::new();
        for title in titles {
            if !seen.insert(title.number) {
                tracing::debug!(number = title.number, "duplicate title, keeping first");
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO titles (
                    number, name, latest_amended_on, latest_issue_date, up_to_date_as_of, reserved
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(title.number))
            .bind(&title.name)
            .bind(title.latest_amended_on)
            .bind(title.latest_issue_date)
            .bind(title.up_to_date_as_of)
            .bind(title.reserved)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(seen.len())
    }

    /// Load the snapshot of one title taken at `effective_date`.
    ///
    /// Runs in one transaction: records are upserted, text changes get a
    /// revision, and stored records of the title that are missing from
    /// `records` are deleted with a `removed` revision. A snapshot older than
    /// the last one loaded for the title is rejected.
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    pub async fn load_title(
        &self,
        title: u32,
        effective_date: NaiveDate,
        records: &[RegulationRecord],
    ) -> Result<LoadSummary> {
        validate_batch(title, records)?;

        let mut tx = self.pool.begin().await?;

        let latest: Option<NaiveDate> =
            sqlx::query_scalar("SELECT effective_date FROM title_snapshots WHERE title = ?")
                .bind(i64::from(title))
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(latest) = latest {
            if effective_date < latest {
                return Err(PipelineError::StaleSnapshot {
                    title,
                    effective_date,
                    latest,
                });
            }
        }

        let existing: HashMap<String, StoredText> = sqlx::query_as::<_, StoredText>(
            "SELECT id, heading, body, agency_slug FROM regulations WHERE title = ?",
        )
        .bind(i64::from(title))
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| (row.id.clone(), row))
        .collect();

        let mut summary = LoadSummary::default();

        for record in records {
            let change = match existing.get(&record.id) {
                None => Some((ChangeKind::Added, char_len(&record.text))),
                Some(old) if old.heading != record.heading || old.body != record.text => Some((
                    ChangeKind::Amended,
                    char_len(&record.text) - char_len(&old.body),
                )),
                Some(_) => None,
            };

            upsert_record(&mut tx, record).await?;

            match change {
                Some((kind, delta)) => {
                    append_revision(
                        &mut tx,
                        &record.id,
                        effective_date,
                        kind,
                        delta,
                        &record.agency,
                    )
                    .await?;
                    if kind == ChangeKind::Added {
                        summary.added += 1;
                    } else {
                        summary.amended += 1;
                    }
                }
                None => summary.unchanged += 1,
            }
        }

        let incoming: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let mut vanished: Vec<&StoredText> = existing
            .values()
            .filter(|row| !incoming.contains(row.id.as_str()))
            .collect();
        vanished.sort_by(|a, b| a.id.cmp(&b.id));

        for old in vanished {
            sqlx::query("DELETE FROM regulations WHERE id = ?")
                .bind(&old.id)
                .execute(&mut *tx)
                .await?;
            append_revision(
                &mut tx,
                &old.id,
                effective_date,
                ChangeKind::Removed,
                -char_len(&old.body),
                &old.agency_slug,
            )
            .await?;
            summary.removed += 1;
        }

        sqlx::query(
            r#"
            INSERT INTO title_snapshots (title, effective_date, record_count)
            VALUES (?, ?, ?)
            ON CONFLICT (title) DO UPDATE SET
                effective_date = excluded.effective_date,
                record_count = excluded.record_count
            "#,
        )
        .bind(i64::from(title))
        .bind(effective_date)
        .bind(records.len() as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            title,
            %effective_date,
            added = summary.added,
            amended = summary.amended,
            removed = summary.removed,
            unchanged = summary.unchanged,
            "title loaded"
        );
        Ok(summary)
    }

    pub async fn record_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM regulations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Change history of one record, oldest first.
    pub async fn revisions(&self, record_id: &str) -> Result<Vec<RevisionEntry>> {
        let entries = sqlx::query_as::<_, RevisionEntry>(
            r#"
            SELECT record_id, seq, recorded_on, kind, delta_chars, agency_slug
            FROM revisions
            WHERE record_id = ?
            ORDER BY recorded_on, seq
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Hex SHA-256 over the stored agencies, records and revisions.
    ///
    /// Two stores with equal digests hold the same data.
    pub async fn snapshot_digest(&self) -> Result<String> {
        let mut hasher = Sha256::new();

        for (table, sql) in DIGEST_QUERIES {
            hasher.update(table.as_bytes());
            hasher.update(b"\n");
            let rows: Vec<String> = sqlx::query_scalar(sql).fetch_all(&self.pool).await?;
            for row in rows {
                hasher.update(row.as_bytes());
                hasher.update(b"\n");
            }
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn begin_run(&self, effective_date: NaiveDate) -> Result<IngestRun> {
        let run = sqlx::query_as::<_, IngestRun>(
            r#"
            INSERT INTO ingestion_runs (id, started_at, effective_date, status)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .bind(effective_date)
        .bind(IngestStatus::Running)
        .fetch_one(&self.pool)
        .await?;

        Ok(run)
    }

    #[tracing::instrument(skip(self, outcome), fields(status = %outcome.status))]
    pub async fn finish_run(&self, run_id: Uuid, outcome: RunOutcome) -> Result<IngestRun> {
        let run = sqlx::query_as::<_, IngestRun>(
            r#"
            UPDATE ingestion_runs
            SET finished_at = ?, status = ?, record_count = ?, skipped_pages = ?, error = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(outcome.status)
        .bind(outcome.record_count)
        .bind(outcome.skipped_pages)
        .bind(outcome.error)
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PipelineError::RunNotFound(run_id))?;

        Ok(run)
    }

    /// Most recently started run, if any.
    pub async fn latest_run(&self) -> Result<Option<IngestRun>> {
        let run = sqlx::query_as::<_, IngestRun>(
            "SELECT * FROM ingestion_runs ORDER BY started_at DESC, rowid DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(run)
    }
}

fn validate_batch(title: u32, records: &[RegulationRecord]) -> Result<()> {
    let mut ids: HashSet<&str> = HashSet::with_capacity(records.len());
    for record in records {
        if record.hierarchy.title != title {
            return Err(PipelineError::InvalidInput(format!(
                "record {} belongs to title {}, not {title}",
                record.id, record.hierarchy.title
            )));
        }
        if !ids.insert(record.id.as_str()) {
            return Err(PipelineError::InvalidInput(format!(
                "duplicate record {} in title {title}",
                record.id
            )));
        }
    }
    Ok(())
}

fn char_len(text: &str) -> i64 {
    text.chars().count() as i64
}

async fn upsert_record(conn: &mut SqliteConnection, record: &RegulationRecord) -> Result<()> {
    let h = &record.hierarchy;
    sqlx::query(
        r#"
        INSERT INTO regulations (
            id, agency_slug, title, subtitle, chapter, subchapter, part, subpart,
            section, heading, body, word_count, effective_date, revision_ref
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            agency_slug = excluded.agency_slug,
            subtitle = excluded.subtitle,
            chapter = excluded.chapter,
            subchapter = excluded.subchapter,
            part = excluded.part,
            subpart = excluded.subpart,
            section = excluded.section,
            heading = excluded.heading,
            body = excluded.body,
            word_count = excluded.word_count,
            effective_date = excluded.effective_date,
            revision_ref = excluded.revision_ref
        "#,
    )
    .bind(&record.id)
    .bind(&record.agency)
    .bind(i64::from(h.title))
    .bind(h.subtitle.as_deref())
    .bind(h.chapter.as_deref())
    .bind(h.subchapter.as_deref())
    .bind(h.part.as_deref())
    .bind(h.subpart.as_deref())
    .bind(&record.section)
    .bind(&record.heading)
    .bind(&record.text)
    .bind(record.word_count() as i64)
    .bind(record.effective_date)
    .bind(&record.revision_ref)
    .execute(conn)
    .await?;

    Ok(())
}

async fn append_revision(
    conn: &mut SqliteConnection,
    record_id: &str,
    recorded_on: NaiveDate,
    kind: ChangeKind,
    delta_chars: i64,
    agency_slug: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO revisions (record_id, seq, recorded_on, kind, delta_chars, agency_slug)
        VALUES (
            ?1,
            (SELECT COALESCE(MAX(seq), 0) + 1 FROM revisions WHERE record_id = ?1),
            ?2, ?3, ?4, ?5
        )
        "#,
    )
    .bind(record_id)
    .bind(recorded_on)
    .bind(kind)
    .bind(delta_chars)
    .bind(agency_slug)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecfr_harvester::Hierarchy;

    fn record(title: u32, section: &str) -> RegulationRecord {
        RegulationRecord {
            id: RegulationRecord::citation(title, section),
            agency: "environmental-protection-agency".to_string(),
            hierarchy: Hierarchy {
                title,
                ..Hierarchy::default()
            },
            section: section.to_string(),
            heading: String::new(),
            text: String::new(),
            effective_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            revision_ref: String::new(),
        }
    }

    #[test]
    fn test_validate_batch_rejects_foreign_title() {
        let err = validate_batch(40, &[record(40, "1.1"), record(41, "1.1")]).unwrap_err();
        assert!(err.to_string().contains("belongs to title 41"));
    }

    #[test]
    fn test_validate_batch_rejects_duplicates() {
        let err = validate_batch(40, &[record(40, "1.1"), record(40, "1.1")]).unwrap_err();
        assert!(err.to_string().contains("duplicate record 40 CFR 1.1"));
    }

    #[test]
    fn test_char_len_counts_chars_not_bytes() {
        assert_eq!(char_len("§ 1.1"), 5);
    }
}
