//! API route definitions and handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use super::error::ApiError;
use super::state::AppState;
use crate::ingest;
use crate::model::{Page, RunStatus, StoredRun, Submission};
use crate::query::analytics::{self, Analytics, DateRange};
use crate::query::{self, PageParams, RunFilters};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/test-runs", post(create_test_run).get(list_test_runs))
        .route("/test-runs/{id}", get(get_test_run))
        .route("/analytics", get(get_analytics))
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

async fn create_test_run(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, axum::extract::rejection::JsonRejection>,
) -> Result<(StatusCode, Json<StoredRun>), ApiError> {
    let Json(raw) = body.map_err(|err| {
        debug!(error = %err, "unreadable submission body");
        ApiError::bad_request("INVALID_BODY", "Invalid request data")
    })?;

    let submission: Submission = serde_json::from_value(raw).map_err(|err| {
        debug!(error = %err, "submission failed to parse");
        ApiError::bad_request("INVALID_BODY", "Invalid request data")
    })?;

    let stored = ingest::ingest_submission(&state.pool, &submission)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

// ---------------------------------------------------------------------------
// Listing and retrieval
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    status: Option<String>,
    #[serde(rename = "projectName")]
    project_name: Option<String>,
}

async fn list_test_runs(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Page<StoredRun>>, ApiError> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(20);
    if page < 1 || !(1..=100).contains(&limit) {
        return Err(ApiError::bad_request(
            "INVALID_PAGINATION",
            "page must be >= 1 and limit between 1 and 100",
        ));
    }

    let status: Option<RunStatus> = params
        .status
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|_| ApiError::bad_request("INVALID_STATUS", "unknown run status"))?;

    let filters = RunFilters {
        status,
        project_name: params.project_name,
    };
    let result = query::list_runs(&state.pool, &filters, PageParams { page, limit })?;
    Ok(Json(result))
}

async fn get_test_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredRun>, ApiError> {
    match query::get_run(&state.pool, &id)? {
        Some(run) => Ok(Json(run)),
        None => Err(ApiError::not_found("Test run not found")),
    }
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    from: Option<String>,
    to: Option<String>,
}

async fn get_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<Analytics>, ApiError> {
    let to = parse_bound(params.to.as_deref())?.unwrap_or_else(Utc::now);
    let from =
        parse_bound(params.from.as_deref())?.unwrap_or_else(|| to - chrono::Duration::days(30));

    let data = analytics::compute(&state.pool, DateRange { from, to })?;
    Ok(Json(data))
}

/// Accept either a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
fn parse_bound(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw else { return Ok(None) };

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date.and_time(chrono::NaiveTime::MIN).and_utc()));
    }

    Err(ApiError::bad_request(
        "INVALID_DATE_RANGE",
        "dates must be RFC 3339 timestamps or YYYY-MM-DD",
    ))
}
