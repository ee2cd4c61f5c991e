use super::*;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use pagewatch_cdp::testing::ScriptedSession;
use pagewatch_control::{BridgeConfig, ControlBridge, ScreenshotStore};
use pagewatch_log::{
    LogFilter, LogLevel, LogStore, LogType, LogWriter, RawEntry, ScreenshotIndex, SessionMetadata,
    enrich,
};
use serde_json::{Value, json};
use tower::ServiceExt;

struct Fixture {
    _dir: tempfile::TempDir,
    state: Arc<AppState>,
    session: Arc<ScriptedSession>,
}

fn raw(second: u32, entry_type: LogType, level: LogLevel, data: Value) -> RawEntry {
    RawEntry {
        timestamp: format!("2024-05-01T10:20:{:02}.000Z", second),
        entry_type,
        level,
        source: "test".to_string(),
        data,
        context: None,
    }
}

fn fixture(with_bridge: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let writer = LogWriter::create(
        &dir.path().join("logs"),
        SessionMetadata::new("2024-05-01T10:20:00.000Z", LogFilter::default())
            .with_target_url("https://shop.test/"),
    )
    .unwrap();

    let index = ScreenshotIndex::new();
    for raw in [
        raw(1, LogType::Console, LogLevel::Info, json!({"message": "booted"})),
        raw(
            2,
            LogType::Network,
            LogLevel::Error,
            json!({"url": "https://shop.test/api/cart", "errorText": "net::ERR_FAILED"}),
        ),
        raw(
            3,
            LogType::Performance,
            LogLevel::Info,
            json!({"metric": "LayoutCount", "value": 12}),
        ),
    ] {
        writer.append(&enrich(raw, &index)).unwrap();
    }

    let shots = dir.path().join("shots");
    let session = ScriptedSession::new();
    let mut state = AppState::new(
        Arc::new(LogStore::new(writer.path(), Some(shots.clone()))),
        ScreenshotStore::new(&shots),
    );
    if with_bridge {
        state = state.with_bridge(Arc::new(ControlBridge::new(
            session.clone(),
            BridgeConfig::default(),
            ScreenshotStore::new(&shots),
        )));
    }

    Fixture {
        _dir: dir,
        state: Arc::new(state),
        session,
    }
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    send(state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post(state: &Arc<AppState>, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        state,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_list_logs_and_query() {
    let fx = fixture(false);

    let (status, body) = get(&fx.state, "/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["entries"][0]["data"]["message"], "booted");
    assert!(body["entries"][0]["id"].is_string());

    let (_, body) = get(&fx.state, "/logs?type=network").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["entries"][0]["type"], "network");

    let (_, body) = get(&fx.state, "/logs?limit=2").await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["entries"][1]["type"], "performance");

    let (_, body) = get(&fx.state, "/logs?since=2024-05-01T10:20:02.000Z").await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_views() {
    let fx = fixture(false);

    let (status, body) = get(&fx.state, "/logs/metadata").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionStart"], "2024-05-01T10:20:00.000Z");
    assert_eq!(body["targetUrl"], "https://shop.test/");

    let (_, body) = get(&fx.state, "/logs/errors").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["entries"][0]["level"], "error");

    let (_, body) = get(&fx.state, "/logs/performance").await;
    assert_eq!(body["count"], 1);

    let (_, body) = get(&fx.state, "/logs/stats").await;
    assert_eq!(body["stats"]["total"], 3);
    assert_eq!(body["stats"]["errors"], 1);
    assert_eq!(body["parseErrors"], 0);
}

#[tokio::test]
async fn test_entry_by_id() {
    let fx = fixture(false);
    let (_, body) = get(&fx.state, "/logs/errors").await;
    let id = body["entries"][0]["id"].as_str().unwrap().to_string();

    let (status, entry) = get(&fx.state, &format!("/logs/entries/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["id"], id.as_str());

    let (status, body) = get(&fx.state, "/logs/entries/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_logs_pick_up_appended_entries() {
    let dir = tempfile::tempdir().unwrap();
    let writer = LogWriter::create(
        dir.path(),
        SessionMetadata::new("2024-05-01T10:20:00.000Z", LogFilter::default()),
    )
    .unwrap();
    let state = Arc::new(AppState::new(
        Arc::new(LogStore::new(writer.path(), None)),
        ScreenshotStore::new(dir.path().join("shots")),
    ));

    let (_, body) = get(&state, "/logs").await;
    assert_eq!(body["count"], 0);

    let entry = enrich(
        raw(5, LogType::Console, LogLevel::Warn, json!({"message": "late"})),
        &ScreenshotIndex::new(),
    );
    writer.append(&entry).unwrap();

    let (_, body) = get(&state, "/logs").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["entries"][0]["data"]["message"], "late");
}

#[tokio::test]
async fn test_control_evaluate() {
    let fx = fixture(true);
    fx.session.respond(
        "Runtime.evaluate",
        json!({"result": {"type": "number", "value": 2}}),
    );

    let (status, body) = post(
        &fx.state,
        "/control",
        json!({"action": "evaluate", "code": "1 + 1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["value"], 2);
    assert!(body["timestamp"].is_string());
    assert_eq!(fx.state.request_count(), 1);
}

#[tokio::test]
async fn test_control_failure_echoes_params() {
    let fx = fixture(true);
    fx.session.respond(
        "Runtime.evaluate",
        json!({
            "result": {"type": "object", "subtype": "error"},
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "ReferenceError: nope is not defined"}
            }
        }),
    );

    let (status, body) = post(
        &fx.state,
        "/control",
        json!({"action": "evaluate", "code": "nope()"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "execution");
    assert!(body["error"].as_str().unwrap().contains("ReferenceError"));
    assert_eq!(body["code"], "nope()");
}

#[tokio::test]
async fn test_control_rejects_unknown_action() {
    let fx = fixture(true);
    let (status, body) = post(&fx.state, "/control", json!({"action": "teleport"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "invalid_request");
}

#[tokio::test]
async fn test_control_without_bridge() {
    let fx = fixture(false);
    let (status, body) = post(
        &fx.state,
        "/control",
        json!({"action": "evaluate", "code": "1"}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("control bridge"));
}

#[tokio::test]
async fn test_tools() {
    let fx = fixture(true);

    let (status, body) = get(&fx.state, "/tools").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 10);
    assert!(
        body["tools"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["name"] == "wait-for-network-idle")
    );

    let (_, body) = get(&fx.state, "/tools?format=openai").await;
    assert_eq!(body["tools"][0]["type"], "function");

    let (_, body) = get(&fx.state, "/tools?format=anthropic").await;
    assert!(body["tools"][0]["input_schema"].is_object());

    let (status, _) = get(&fx.state, "/tools?format=xml").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    fx.session.respond(
        "Runtime.evaluate",
        json!({"result": {"type": "string", "value": "Shop"}}),
    );
    let (status, body) = post(
        &fx.state,
        "/tools/evaluate",
        json!({"code": "document.title"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["value"], "Shop");
}

#[tokio::test]
async fn test_screenshots_listing() {
    let fx = fixture(false);

    let (status, body) = get(&fx.state, "/screenshots").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    fx.state
        .screenshots
        .save("2024-05-01T10:20:02.000Z", "network_failure", b"png")
        .await
        .unwrap();
    let (_, body) = get(&fx.state, "/screenshots").await;
    assert_eq!(body["count"], 1);
    assert!(body["screenshots"][0]["stamp"].is_string());

    // Entries in the same second are now correlated.
    let (_, body) = get(&fx.state, "/logs/errors").await;
    assert_eq!(body["entries"][0]["hasScreenshot"], true);
}

#[tokio::test]
async fn test_health() {
    let fx = fixture(true);
    let (status, body) = get(&fx.state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"][0]["name"], "session");

    fx.session.disconnect();
    let (_, body) = get(&fx.state, "/health").await;
    assert_eq!(body["status"], "unhealthy");

    let fx = fixture(false);
    let (_, body) = get(&fx.state, "/health").await;
    assert_eq!(body["status"], "degraded");
}
