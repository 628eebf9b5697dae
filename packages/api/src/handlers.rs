use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;

use crate::error::{ApiError, Result};
use crate::metrics;
use crate::models::{
    AgencyMetrics, AgencySummary, ChartData, DateRange, Kpi, MetricsQuery, RefreshInfo,
    SearchHit, SearchQuery, SearchRequest, TableData, TitleInfo,
};
use crate::state::AppState;

pub async fn health(
    State(state): State<AppState>,
) -> std::result::Result<&'static str, StatusCode> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok("OK")
}

pub async fn list_agencies(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgencySummary>>> {
    Ok(Json(metrics::list_agencies(&state.pool).await?))
}

pub async fn list_titles(State(state): State<AppState>) -> Result<Json<Vec<TitleInfo>>> {
    Ok(Json(metrics::list_titles(&state.pool).await?))
}

pub async fn agency_metrics(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<AgencyMetrics>> {
    let range = DateRange {
        from: parse_date("from", params.from.as_deref())?,
        to: parse_date("to", params.to.as_deref())?,
    };
    let metrics = metrics::agency_metrics(&state.pool, &state.alignment, &slug, range).await?;
    Ok(Json(metrics))
}

pub async fn kpi(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<Kpi>>> {
    let kpis = metrics::kpis(&state.pool, &state.alignment, params.search.as_deref()).await?;
    Ok(Json(kpis))
}

pub async fn chart(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<ChartData>> {
    Ok(Json(metrics::chart(&state.pool, params.search.as_deref()).await?))
}

pub async fn table(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<TableData>> {
    Ok(Json(metrics::table(&state.pool, params.search.as_deref()).await?))
}

pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>> {
    match request.mode.as_deref() {
        None | Some("keyword") => {}
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "unsupported search mode '{other}'"
            )))
        }
    }
    let hits = metrics::search(&state.pool, request.query.as_deref()).await?;
    Ok(Json(hits))
}

pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshInfo>> {
    Ok(Json(metrics::refresh_info(&state.pool).await?))
}

fn parse_date(name: &str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ApiError::BadRequest(format!("'{name}' must be YYYY-MM-DD, got '{raw}'"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("from", None).unwrap(), None);
        assert_eq!(parse_date("from", Some("")).unwrap(), None);
        assert_eq!(
            parse_date("from", Some("2025-01-06")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6)
        );
        let err = parse_date("to", Some("06/01/2025")).unwrap_err();
        assert!(err.to_string().contains("'to' must be YYYY-MM-DD"));
    }
}
