//! Read-only log and screenshot views.
//!
//! Every view rescans the shared tail first, so it reflects whatever the
//! writer has flushed so far.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use pagewatch_control::ScreenshotInfo;
use pagewatch_log::query::{errors_only, find_by_id, performance_only};
use pagewatch_log::{LogEntry, LogQuery, LogStats, ParsedLog, SessionMetadata};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// A list of entries.
#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    pub entries: Vec<LogEntry>,
}

impl EntriesResponse {
    fn from_refs(entries: Vec<&LogEntry>) -> Self {
        Self {
            count: entries.len(),
            entries: entries.into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub stats: LogStats,
    /// Records skipped because they were not valid JSON.
    pub parse_errors: u64,
    /// Records skipped because they lacked required fields.
    pub validation_errors: u64,
}

#[derive(Debug, Serialize)]
pub struct ScreenshotsResponse {
    pub count: usize,
    pub screenshots: Vec<ScreenshotInfo>,
}

async fn load(state: &AppState) -> Result<ParsedLog, ApiError> {
    let store = state.logs.clone();
    let parsed = tokio::task::spawn_blocking(move || store.load())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(parsed)
}

/// Entries matching the query string.
///
/// GET /logs?type=&level=&minSeverity=&category=&since=&limit=
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let parsed = load(&state).await?;
    Ok(Json(EntriesResponse::from_refs(query.apply(&parsed.entries))))
}

/// GET /logs/metadata
pub async fn metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionMetadata>, ApiError> {
    load(&state)
        .await?
        .metadata
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("session metadata".to_string()))
}

/// GET /logs/errors
pub async fn errors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let parsed = load(&state).await?;
    Ok(Json(EntriesResponse::from_refs(errors_only(&parsed.entries))))
}

/// GET /logs/performance
pub async fn performance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let parsed = load(&state).await?;
    Ok(Json(EntriesResponse::from_refs(performance_only(
        &parsed.entries,
    ))))
}

/// GET /logs/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let parsed = load(&state).await?;
    Ok(Json(StatsResponse {
        stats: parsed.stats(),
        parse_errors: parsed.parse_errors,
        validation_errors: parsed.validation_errors,
    }))
}

/// GET /logs/entries/{id}
pub async fn entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LogEntry>, ApiError> {
    let parsed = load(&state).await?;
    find_by_id(&parsed.entries, &id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("entry {}", id)))
}

/// GET /screenshots
pub async fn screenshots(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScreenshotsResponse>, ApiError> {
    let screenshots = state.screenshots.list().await?;
    Ok(Json(ScreenshotsResponse {
        count: screenshots.len(),
        screenshots,
    }))
}
