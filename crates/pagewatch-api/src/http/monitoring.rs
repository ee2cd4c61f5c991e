//! Health check handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    /// Control requests served.
    pub requests: u64,
    pub components: Vec<ComponentHealth>,
}

/// Component health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    fn new(name: &str, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
        }
    }
}

fn overall(components: &[ComponentHealth]) -> HealthStatus {
    if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let session = match &state.bridge {
        Some(bridge) if bridge.session().is_connected() => {
            ComponentHealth::new("session", HealthStatus::Healthy, None)
        }
        Some(_) => ComponentHealth::new(
            "session",
            HealthStatus::Unhealthy,
            Some("browser disconnected".to_string()),
        ),
        None => ComponentHealth::new(
            "session",
            HealthStatus::Degraded,
            Some("no control bridge attached".to_string()),
        ),
    };

    let path = state.logs.path();
    let log = if path.exists() {
        ComponentHealth::new("log", HealthStatus::Healthy, Some(path.display().to_string()))
    } else {
        ComponentHealth::new(
            "log",
            HealthStatus::Degraded,
            Some(format!("{} not written yet", path.display())),
        )
    };

    let components = vec![session, log];
    Json(HealthResponse {
        status: overall(&components),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
        requests: state.request_count(),
        components,
    })
}

/// GET /livez
pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "alive" }))
}
