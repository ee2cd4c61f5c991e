//! HTTP route definitions.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::http::{control, logs, monitoring, stream};
use crate::state::AppState;

/// Create the router.
///
/// ## Route Structure
///
/// ```text
/// POST   /control            - Execute a control request
/// GET    /tools              - Tool definitions (?format=native|anthropic|openai)
/// POST   /tools/{name}       - Execute a tool call
///
/// GET    /logs               - Entries (?type=&level=&minSeverity=&category=&since=&limit=)
/// GET    /logs/metadata      - Session metadata
/// GET    /logs/errors        - Error entries
/// GET    /logs/performance   - Performance entries
/// GET    /logs/stats         - Statistics
/// GET    /logs/entries/{id}  - One entry
/// GET    /logs/stream        - Live entries (WebSocket)
///
/// GET    /screenshots        - Screenshot files
///
/// GET    /health             - Component health
/// GET    /livez              - Liveness probe
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/control", post(control::control))
        .route("/tools", get(control::list_tools))
        .route("/tools/{name}", post(control::call_tool))
        .route("/logs", get(logs::list_logs))
        .route("/logs/metadata", get(logs::metadata))
        .route("/logs/errors", get(logs::errors))
        .route("/logs/performance", get(logs::performance))
        .route("/logs/stats", get(logs::stats))
        .route("/logs/entries/{id}", get(logs::entry))
        .route("/logs/stream", get(stream::log_stream))
        .route("/screenshots", get(logs::screenshots))
        .route("/health", get(monitoring::health))
        .route("/livez", get(monitoring::liveness))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
