//! Search job endpoints: submit, status, results, listing, delete.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quaestor_common::error::ApiError;
use quaestor_common::models::{
    JobSummary, RecordMetadata, SearchConstraints, SourceOutcome, SourceSpec,
};

use crate::state::SharedState;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_LIST_LIMIT: usize = 20;

// ── Request / Response shapes ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: Option<usize>,
    pub sources: Option<Vec<String>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub language: Option<String>,
    #[serde(default)]
    pub use_ai_enhancement: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub search_id: Uuid,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub search_id: Uuid,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_query: Option<String>,
    pub status: &'static str,
    pub results_count: usize,
    pub sources: Vec<SourceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ResultsParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub search_id: Uuid,
    pub records: Vec<RecordMetadata>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub searches: Vec<JobSummary>,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// POST /api/search — accept a job and return immediately.
pub async fn submit_search(
    State(state): State<SharedState>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let defaults = SearchConstraints::default();

    let sources = match req.sources {
        None => defaults.sources,
        Some(names) => {
            let mut parsed = Vec::with_capacity(names.len());
            for name in &names {
                let spec = SourceSpec::parse(name).ok_or_else(|| {
                    ApiError::BadRequest(format!(
                        "unknown source {name:?}; supported: pubmed, arxiv, crossref"
                    ))
                })?;
                if !parsed.contains(&spec) {
                    parsed.push(spec);
                }
            }
            parsed
        }
    };

    let constraints = SearchConstraints {
        max_results: req.max_results.unwrap_or(defaults.max_results),
        sources,
        date_from: req.date_from,
        date_to: req.date_to,
        language: req.language,
        use_ai_enhancement: req.use_ai_enhancement,
    };

    let id = state.search.submit(&req.query, constraints).await?;
    Ok(Json(SubmitResponse {
        search_id: id,
        status: "processing",
        message: "Search accepted; poll the status endpoint for progress",
    }))
}

/// GET /api/search/{id}/status
pub async fn get_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.search.status(id).await?;
    Ok(Json(StatusResponse {
        search_id: job.id,
        query: job.query,
        enhanced_query: job.enhanced_query,
        status: job.status.as_str(),
        results_count: job.results_count,
        sources: job.source_outcomes,
        error: job.error,
        created_at: job.created_at,
        updated_at: job.updated_at,
    }))
}

/// GET /api/search/{id}/results?page=&page_size=
pub async fn get_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ResultsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let (records, total) = state.search.results(id, page, page_size).await?;
    Ok(Json(ResultsResponse {
        search_id: id,
        records,
        total,
        page,
        page_size,
    }))
}

/// GET /api/searches?limit=
pub async fn list_searches(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let searches = state.search.list_recent(limit).await?;
    Ok(Json(ListResponse { searches }))
}

/// DELETE /api/search/{id} — idempotent.
pub async fn delete_search(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.search.delete(id).await?;
    Ok(Json(serde_json::json!({
        "message": format!("search {id} deleted")
    })))
}
