//! The ingestion batch job.
//!
//! One run fetches the agency list and the title summaries, then every
//! requested title one page at a time, and loads each page into the
//! warehouse as it arrives. Pages whose payload cannot be parsed are
//! skipped; any other failure aborts the run.
//! The run's outcome is written to the run log either way.

use std::sync::Arc;

use chrono::NaiveDate;
use ecfr_harvester::titles::active_titles;
use ecfr_harvester::{
    Agency, AgencyIndex, ClientConfig, Cursor, ErrorKind, Page, RegistryClient, SectionRequest,
    TitleSummary,
};
use serde::Serialize;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::models::{IngestStatus, RunOutcome};
use crate::warehouse::Warehouse;

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub status: IngestStatus,
    pub effective_date: NaiveDate,
    pub agencies: usize,
    pub titles_loaded: Vec<u32>,
    /// Titles whose page was skipped because it could not be parsed.
    pub skipped_titles: Vec<u32>,
    /// Records in the store after the run.
    pub record_count: i64,
    pub unowned: usize,
}

/// Open the configured store and run one ingestion.
pub async fn run_ingest(config: &IngestConfig) -> Result<IngestReport> {
    let warehouse = Warehouse::open(&config.store).await?;
    let date = config
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    ingest(&warehouse, config.client.clone(), config.titles.clone(), date).await
}

/// Run one ingestion into `warehouse` and record it in the run log.
///
/// On a fatal error the run is marked failed before the error is returned.
#[tracing::instrument(skip(warehouse, client_config, titles))]
pub async fn ingest(
    warehouse: &Warehouse,
    client_config: ClientConfig,
    titles: Option<Vec<u32>>,
    date: NaiveDate,
) -> Result<IngestReport> {
    let run = warehouse.begin_run(date).await?;
    tracing::info!(run_id = %run.id, "ingestion started");

    match ingest_pages(warehouse, client_config, titles, date, run.id).await {
        Ok(report) => {
            let skipped = report.skipped_titles.len() as i64;
            let error = (!report.skipped_titles.is_empty()).then(|| {
                format!("skipped unparseable titles: {:?}", report.skipped_titles)
            });
            warehouse
                .finish_run(
                    run.id,
                    RunOutcome {
                        status: report.status,
                        record_count: report.record_count,
                        skipped_pages: skipped,
                        error,
                    },
                )
                .await?;
            tracing::info!(
                run_id = %run.id,
                status = %report.status,
                records = report.record_count,
                skipped = skipped,
                "ingestion finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(run_id = %run.id, error = %e, "ingestion failed");
            let record_count = warehouse.record_count().await.unwrap_or_default();
            if let Err(log_err) = warehouse
                .finish_run(
                    run.id,
                    RunOutcome {
                        status: IngestStatus::Failed,
                        record_count,
                        skipped_pages: 0,
                        error: Some(e.to_string()),
                    },
                )
                .await
            {
                tracing::error!(run_id = %run.id, error = %log_err, "failed to record failed run");
            }
            Err(e)
        }
    }
}

async fn ingest_pages(
    warehouse: &Warehouse,
    client_config: ClientConfig,
    titles: Option<Vec<u32>>,
    date: NaiveDate,
    run_id: Uuid,
) -> Result<IngestReport> {
    let (client, agencies, summaries) = tokio::task::spawn_blocking(
        move || -> ecfr_harvester::Result<(RegistryClient, Vec<Agency>, Vec<TitleSummary>)> {
            let client = RegistryClient::new(client_config)?;
            let agencies = client.agencies()?;
            let summaries = client.titles()?;
            Ok((client, agencies, summaries))
        },
    )
    .await??;
    let titles = titles.unwrap_or_else(|| active_titles(&summaries));

    let agency_count = warehouse.load_agencies(&agencies).await?;
    warehouse.load_titles(&summaries).await?;
    let owners = AgencyIndex::new(&agencies);
    if owners.is_empty() {
        tracing::warn!("no agency claims any CFR location; every section will be unowned");
    }

    let client = Arc::new(client);
    let request = Arc::new(SectionRequest::new(date, titles, owners));

    let mut report = IngestReport {
        run_id,
        status: IngestStatus::Success,
        effective_date: date,
        agencies: agency_count,
        titles_loaded: Vec::new(),
        skipped_titles: Vec::new(),
        record_count: 0,
        unowned: 0,
    };

    let mut cursor: Option<Cursor> = None;
    for _ in 0..request.page_count() {
        let page = fetch_page(&client, &request, cursor).await?;
        let position = cursor.map_or(0, Cursor::position);
        let title = request.titles.get(position).copied().unwrap_or_default();

        match page {
            Ok(page) => {
                warehouse
                    .load_title(page.title, date, &page.records)
                    .await?;
                report.titles_loaded.push(page.title);
                report.unowned += page.unowned;
                cursor = page.next;
            }
            Err(e) if e.kind() == ErrorKind::Parse => {
                tracing::warn!(title, error = %e, "skipping unparseable title");
                report.skipped_titles.push(title);
                cursor = request.cursor_after(cursor);
            }
            Err(e) => return Err(e.into()),
        }

        if cursor.is_none() {
            break;
        }
    }

    report.record_count = warehouse.record_count().await?;
    report.status = outcome_status(report.titles_loaded.len(), report.skipped_titles.len());
    Ok(report)
}

async fn fetch_page(
    client: &Arc<RegistryClient>,
    request: &Arc<SectionRequest>,
    cursor: Option<Cursor>,
) -> Result<ecfr_harvester::Result<Page>> {
    let client = Arc::clone(client);
    let request = Arc::clone(request);
    let page = tokio::task::spawn_blocking(move || client.fetch_page(&request, cursor)).await?;
    Ok(page)
}

/// Success when nothing was skipped, failed when nothing was loaded.
fn outcome_status(loaded: usize, skipped: usize) -> IngestStatus {
    match (loaded, skipped) {
        (_, 0) => IngestStatus::Success,
        (0, _) => IngestStatus::Failed,
        _ => IngestStatus::Partial,
    }
}
