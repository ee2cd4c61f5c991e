//! Control and tool handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use pagewatch_control::{ControlResponse, control_tools};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// HTTP status for a control response. The body always carries the detail.
pub fn status_for(response: &ControlResponse) -> StatusCode {
    match response.error_kind.as_deref() {
        None => StatusCode::OK,
        Some("invalid_request") => StatusCode::BAD_REQUEST,
        Some("connection") => StatusCode::SERVICE_UNAVAILABLE,
        Some("timeout") => StatusCode::GATEWAY_TIMEOUT,
        Some(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Execute one control request.
///
/// POST /control
pub async fn control(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let bridge = state
        .bridge
        .as_ref()
        .ok_or(ApiError::Unavailable("control bridge"))?;
    state.increment_requests();

    let response = bridge.execute_value(body).await;
    if let Some(error) = &response.error {
        info!("Control request failed: {}", error);
    }
    Ok((status_for(&response), Json(response)))
}

/// Execute a tool call; the body is the tool input.
///
/// POST /tools/{name}
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(input): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let bridge = state
        .bridge
        .as_ref()
        .ok_or(ApiError::Unavailable("control bridge"))?;
    state.increment_requests();

    let response = bridge.call_tool(&name, input).await;
    Ok((status_for(&response), Json(response)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolsQuery {
    /// `native` (default), `anthropic` or `openai`.
    pub format: Option<String>,
}

/// List tool definitions.
///
/// GET /tools
pub async fn list_tools(Query(query): Query<ToolsQuery>) -> Result<Json<Value>, ApiError> {
    let tools = control_tools();
    let rendered: Vec<Value> = match query.format.as_deref().unwrap_or("native") {
        "native" => tools
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        "anthropic" => tools.iter().map(|t| t.to_anthropic_tool()).collect(),
        "openai" => tools.iter().map(|t| t.to_openai_function()).collect(),
        other => return Err(ApiError::BadRequest(format!("unknown tool format: {}", other))),
    };

    Ok(Json(json!({
        "count": rendered.len(),
        "tools": rendered,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewatch_control::ControlError;
    use serde_json::Map;

    #[test]
    fn test_status_for() {
        assert_eq!(status_for(&ControlResponse::ok(json!(1))), StatusCode::OK);

        let cases = [
            (ControlError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (ControlError::Connection("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ControlError::Execution("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&ControlResponse::failure(&error, Map::new())), status);
        }
    }
}
