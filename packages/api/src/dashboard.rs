//! Server-rendered dashboard over the metrics API.
//!
//! Holds no state of its own: every page is built from API responses. When
//! the API cannot be reached, or does not know the requested agency, the
//! page still renders and carries a message saying so.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use handlebars::Handlebars;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::DashboardConfig;
use crate::models::{
    AgencyMetrics, ChartData, Kpi, MetricsQuery, RefreshInfo, SearchHit, SearchQuery,
    SearchRequest, TableData,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const HEADER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{title}} - eCFR Analyzer</title>
<style>
body { font-family: sans-serif; margin: 2rem; }
table { border-collapse: collapse; }
th, td { border: 1px solid #ccc; padding: 4px 8px; text-align: left; }
.message { background: #fdecea; border: 1px solid #e0a39c; padding: 8px; }
</style>
</head>
<body>
<h1><a href="/">eCFR Analyzer</a></h1>
{{#each messages}}<p class="message">{{this}}</p>
{{/each}}"#;

const INDEX: &str = r#"{{> header}}
<form method="get" action="/">
<input type="search" name="search" value="{{search}}" placeholder="Filter sections">
<button type="submit">Search</button>
</form>
{{#if refresh}}<p class="refresh">{{refresh}}</p>{{/if}}
{{#if kpis}}
<ul class="kpis">
{{#each kpis}}<li><strong>{{metric}}</strong>: {{value}}</li>
{{/each}}</ul>
{{/if}}
{{#if searching}}
<h2>Search results</h2>
{{#if hits}}
<ol class="hits">
{{#each hits}}<li><a href="/agencies/{{slug}}">{{title}}</a><p>{{snippet}}</p></li>
{{/each}}</ol>
{{else}}
<p>No sections contain "{{search}}".</p>
{{/if}}
{{/if}}
{{#if chart}}
<h2>Sections per agency</h2>
<table class="chart">
<thead><tr><th>Agency</th><th>Sections</th></tr></thead>
<tbody>
{{#each chart}}<tr><td>{{label}}</td><td>{{value}}</td></tr>
{{/each}}</tbody>
</table>
{{/if}}
{{#if table_loaded}}
{{#if table}}
<table>
<thead><tr><th>Agency</th><th>Word Count</th><th>Documents</th><th>Top Words</th></tr></thead>
<tbody>
{{#each table}}<tr><td><a href="/agencies/{{slug}}">{{agency}}</a></td><td>{{word_count}}</td><td>{{document_count}}</td><td>{{top_words}}</td></tr>
{{/each}}</tbody>
</table>
{{else}}
<p>No sections match.</p>
{{/if}}
{{/if}}
</body>
</html>
"#;

const AGENCY: &str = r#"{{> header}}
{{#if metrics}}{{#with metrics}}
<h2>{{name}}</h2>
<ul>
<li>Sections: {{record_count}}</li>
<li>Word count: {{word_count}}</li>
<li>Alignment score: {{alignment}}</li>
</ul>
<h3>Changes</h3>
{{#if changes}}
<table>
<thead><tr><th>Date</th><th>Section</th><th>Change</th><th>Characters</th></tr></thead>
<tbody>
{{#each changes}}<tr><td>{{recorded_on}}</td><td>{{record_id}}</td><td>{{kind}}</td><td>{{delta_chars}}</td></tr>
{{/each}}</tbody>
</table>
{{else}}
<p>No changes recorded in this range.</p>
{{/if}}
{{/with}}{{/if}}
</body>
</html>
"#;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("metrics service unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("metrics service sent an unreadable response: {0}")]
    Decode(reqwest::Error),

    #[error("invalid metrics API URL '{0}'")]
    InvalidApiUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("not found")]
    NotFound,

    #[error("metrics service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("template error: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
}

#[derive(Clone)]
pub struct DashboardState {
    client: reqwest::Client,
    api_url: Url,
    templates: Arc<Handlebars<'static>>,
}

impl DashboardState {
    pub fn new(config: &DashboardConfig) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(DashboardError::Client)?;

        let api_url = Url::parse(&config.api_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| DashboardError::InvalidApiUrl(config.api_url.clone()))?;

        Ok(Self {
            client,
            api_url,
            templates: Arc::new(templates()?),
        })
    }

    /// API URL with `segments` appended, each percent-encoded as one
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, DashboardError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| DashboardError::InvalidApiUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, DashboardError> {
        let request = self.client.get(self.endpoint(segments)?).query(query);
        read_json(request.send().await?).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, DashboardError> {
        let request = self.client.post(self.endpoint(segments)?).json(body);
        read_json(request.send().await?).await
    }

    fn render(&self, status: StatusCode, template: &str, data: &Value) -> Response {
        match self.templates.render(template, data) {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, template, "failed to render page");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
            }
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DashboardError> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(DashboardError::NotFound),
        status if !status.is_success() => Err(DashboardError::Status(status)),
        _ => response.json().await.map_err(DashboardError::Decode),
    }
}

fn templates() -> Result<Handlebars<'static>, DashboardError> {
    let mut handlebars = Handlebars::new();
    handlebars.register_partial("header", HEADER).map_err(Box::new)?;
    handlebars
        .register_template_string("index", INDEX)
        .map_err(Box::new)?;
    handlebars
        .register_template_string("agency", AGENCY)
        .map_err(Box::new)?;
    Ok(handlebars)
}

/// Build the dashboard router.
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/agencies/{slug}", get(agency_page))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn unavailable(e: &DashboardError) -> String {
    tracing::warn!(error = %e, "metrics service request failed");
    match e {
        DashboardError::Decode(_) => {
            format!("Metrics service returned an unexpected response: {e}")
        }
        _ => format!("Metrics service unavailable: {e}"),
    }
}

fn format_kpi(kpi: &Kpi) -> Value {
    let value = match (kpi.metric.as_str(), kpi.value) {
        (_, None) => "n/a".to_string(),
        ("Section Count" | "Word Count", Some(v)) => format!("{v:.0}"),
        (_, Some(v)) => format!("{v:.2}"),
    };
    json!({ "metric": kpi.metric, "value": value })
}

fn format_refresh(info: &RefreshInfo) -> String {
    match info.last_refreshed {
        Some(at) => format!("{}, finished {}", info.detail, at.format("%Y-%m-%d %H:%M UTC")),
        None => info.detail.clone(),
    }
}

async fn index(
    State(state): State<DashboardState>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let search = params.search.unwrap_or_default();
    let searching = !search.trim().is_empty();
    let query = [("search", search.as_str())];
    let search_request = SearchRequest {
        query: Some(search.clone()),
        mode: None,
    };

    let (kpis, table, chart, refresh, hits) = tokio::join!(
        state.fetch::<Vec<Kpi>>(&["api", "kpi"], &query),
        state.fetch::<TableData>(&["api", "table"], &query),
        state.fetch::<ChartData>(&["api", "chart"], &query),
        state.fetch::<RefreshInfo>(&["api", "refresh"], &[]),
        async {
            if searching {
                Some(state.post::<Vec<SearchHit>, _>(&["api", "search"], &search_request).await)
            } else {
                None
            }
        },
    );

    let mut messages: Vec<String> = Vec::new();

    let kpis: Vec<Value> = match kpis {
        Ok(kpis) => kpis.iter().map(format_kpi).collect(),
        Err(e) => {
            messages.push(unavailable(&e));
            Vec::new()
        }
    };

    let (table_loaded, table): (bool, Vec<Value>) = match table {
        Ok(table) => (
            true,
            table
                .data
                .iter()
                .map(|row| {
                    json!({
                        "agency": row.agency,
                        "slug": row.slug,
                        "word_count": row.word_count,
                        "document_count": row.document_count,
                        "top_words": row.top_words.join(", "),
                    })
                })
                .collect(),
        ),
        Err(e) => {
            if messages.is_empty() {
                messages.push(unavailable(&e));
            }
            (false, Vec::new())
        }
    };

    let chart: Vec<Value> = match chart {
        Ok(chart) => chart
            .labels
            .iter()
            .zip(&chart.values)
            .map(|(label, value)| json!({ "label": label, "value": format!("{value:.0}") }))
            .collect(),
        Err(e) => {
            if messages.is_empty() {
                messages.push(unavailable(&e));
            }
            Vec::new()
        }
    };

    let hits: Vec<Value> = match hits {
        Some(Ok(hits)) => hits
            .iter()
            .map(|hit| {
                json!({
                    "title": hit.title,
                    "slug": hit.agency_slug,
                    "snippet": hit.snippet,
                })
            })
            .collect(),
        Some(Err(e)) => {
            if messages.is_empty() {
                messages.push(unavailable(&e));
            }
            Vec::new()
        }
        None => Vec::new(),
    };

    let refresh = refresh.ok().map(|info| format_refresh(&info));

    state.render(
        StatusCode::OK,
        "index",
        &json!({
            "title": "Overview",
            "search": search,
            "messages": messages,
            "kpis": kpis,
            "table_loaded": table_loaded,
            "table": table,
            "chart": chart,
            "searching": searching,
            "hits": hits,
            "refresh": refresh,
        }),
    )
}

async fn agency_page(
    State(state): State<DashboardState>,
    Path(slug): Path<String>,
    Query(params): Query<MetricsQuery>,
) -> Response {
    let mut query: Vec<(&str, &str)> = Vec::new();
    if let Some(from) = params.from.as_deref() {
        query.push(("from", from));
    }
    if let Some(to) = params.to.as_deref() {
        query.push(("to", to));
    }

    let segments = ["api", "agencies", slug.as_str(), "metrics"];
    let (status, messages, metrics) = match state.fetch::<AgencyMetrics>(&segments, &query).await {
        Ok(metrics) => (StatusCode::OK, Vec::new(), Some(metrics)),
        Err(DashboardError::NotFound) => (
            StatusCode::NOT_FOUND,
            vec![format!("Agency '{slug}' was not found.")],
            None,
        ),
        Err(DashboardError::Status(s)) if s == StatusCode::BAD_REQUEST => (
            StatusCode::BAD_REQUEST,
            vec!["Invalid date range; use YYYY-MM-DD.".to_string()],
            None,
        ),
        Err(e) => (StatusCode::OK, vec![unavailable(&e)], None),
    };

    let title = metrics
        .as_ref()
        .map_or_else(|| slug.clone(), |m| m.name.clone());
    let metrics = metrics.map(|m| {
        json!({
            "name": m.name,
            "record_count": m.record_count,
            "word_count": m.word_count,
            "alignment": m
                .alignment_score
                .map_or_else(|| "n/a".to_string(), |s| format!("{s:.2}")),
            "changes": m.changes,
        })
    });

    state.render(
        status,
        "agency",
        &json!({
            "title": title,
            "messages": messages,
            "metrics": metrics,
        }),
    )
}
