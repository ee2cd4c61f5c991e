//! Pipeline behaviour against a scripted protocol session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use pagewatch_cdp::testing::ScriptedSession;
use pagewatch_control::{BridgeConfig, ControlBridge, ControlRequest, ScreenshotStore};
use pagewatch_log::{LogFilter, LogLevel, load};
use pagewatch_monitor::{MonitorConfig, MonitorPipeline};
use serde_json::{Value, json};

fn console(kind: &str, text: &str) -> Value {
    json!({
        "type": kind,
        "args": [{"type": "string", "value": text}],
        "executionContextId": 1,
        "timestamp": 0
    })
}

fn bridge(session: &Arc<ScriptedSession>, shots: &Path) -> Arc<ControlBridge> {
    Arc::new(ControlBridge::new(
        session.clone(),
        BridgeConfig::default(),
        ScreenshotStore::new(shots),
    ))
}

fn messages(path: &Path) -> Vec<String> {
    load(path, None)
        .unwrap()
        .entries
        .iter()
        .map(|e| e.raw.data["message"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_events_are_logged_in_order_while_evaluate_is_outstanding() {
    let dir = tempfile::tempdir().unwrap();
    let session = ScriptedSession::new();
    session.delay("Runtime.evaluate", Duration::from_secs(5));
    session.respond(
        "Runtime.evaluate",
        json!({"result": {"type": "string", "value": "done"}}),
    );
    let bridge = bridge(&session, &dir.path().join("shots"));
    let pipeline = MonitorPipeline::start(
        session.clone(),
        Some(bridge.clone()),
        MonitorConfig::new(dir.path().join("logs")),
    )
    .unwrap();

    let evaluation = tokio::spawn({
        let bridge = bridge.clone();
        async move {
            let request = ControlRequest::from_value(
                json!({"action": "evaluate", "code": "slowTask()", "timeout": 10000}),
            )
            .unwrap();
            bridge.execute(request).await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.call_count("Runtime.evaluate"), 1);

    for text in ["first", "second", "third"] {
        session.emit("Runtime.consoleAPICalled", console("log", text));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!evaluation.is_finished());
    assert_eq!(messages(pipeline.log_path()), ["first", "second", "third"]);

    let response = evaluation.await.unwrap();
    assert!(response.success);

    let log = pipeline.log_path().to_path_buf();
    let stats = pipeline.stop().await.unwrap();
    assert_eq!(stats.written, 3);
    assert_eq!(messages(&log), ["first", "second", "third"]);
}

#[tokio::test]
async fn test_stop_drains_queued_events_and_closes_log() {
    let dir = tempfile::tempdir().unwrap();
    let session = ScriptedSession::new();
    let pipeline = MonitorPipeline::start(
        session.clone(),
        None,
        MonitorConfig::new(dir.path()).with_target_url("https://app.test/"),
    )
    .unwrap();
    assert!(pipeline.is_running());

    for n in 0..50 {
        session.emit("Runtime.consoleAPICalled", console("info", &format!("event {}", n)));
    }
    session.emit("DOM.childNodeCountUpdated", json!({"nodeId": 3, "childNodeCount": 1}));

    let writer = pipeline.writer().clone();
    let stats = pipeline.stop().await.unwrap();
    assert_eq!(stats.written, 50);
    assert_eq!(stats.normalizer.ignored, 1);
    assert!(writer.is_closed());

    let parsed = load(writer.path(), None).unwrap();
    assert_eq!(parsed.entries.len(), 50);
    assert_eq!(parsed.entries[49].raw.data["message"], "event 49");
    assert_eq!(
        parsed.metadata.unwrap().target_url.as_deref(),
        Some("https://app.test/")
    );
}

#[tokio::test]
async fn test_event_burst_is_written_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let session = ScriptedSession::new();
    let pipeline =
        MonitorPipeline::start(session.clone(), None, MonitorConfig::new(dir.path())).unwrap();

    let expected: Vec<String> = (0..200).map(|n| format!("burst {}", n)).collect();
    for text in &expected {
        session.emit("Runtime.consoleAPICalled", console("log", text));
    }
    while pipeline.stats().written < 100 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    session.emit("Runtime.consoleAPICalled", console("log", "after"));

    let log = pipeline.log_path().to_path_buf();
    let stats = pipeline.stop().await.unwrap();
    assert_eq!(stats.written, 201);
    assert_eq!(stats.write_errors, 0);

    let logged = messages(&log);
    assert_eq!(&logged[..200], expected.as_slice());
    assert_eq!(logged[200], "after");
}

#[tokio::test]
async fn test_filtered_events_are_counted_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let session = ScriptedSession::new();
    let mut config = MonitorConfig::new(dir.path());
    config.filter = LogFilter {
        min_level: LogLevel::Warn,
        types: Vec::new(),
    };
    let pipeline = MonitorPipeline::start(session.clone(), None, config).unwrap();

    session.emit("Runtime.consoleAPICalled", console("log", "chatter"));
    session.emit("Runtime.consoleAPICalled", console("warning", "careful"));
    let log = pipeline.log_path().to_path_buf();
    let stats = pipeline.stop().await.unwrap();

    assert_eq!(stats.written, 1);
    assert_eq!(stats.normalizer.filtered, 1);
    assert_eq!(messages(&log), ["careful"]);

    let metadata = load(&log, None).unwrap().metadata.unwrap();
    assert_eq!(metadata.filters.min_level, LogLevel::Warn);
}

#[tokio::test]
async fn test_uncaught_exception_triggers_correlated_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let shots = dir.path().join("shots");
    let session = ScriptedSession::new();
    session.respond(
        "Page.captureScreenshot",
        json!({"data": base64::engine::general_purpose::STANDARD.encode(b"\x89PNG")}),
    );
    let mut config = MonitorConfig::new(dir.path().join("logs"));
    config.screenshot_dir = Some(shots.clone());
    let pipeline =
        MonitorPipeline::start(session.clone(), Some(bridge(&session, &shots)), config).unwrap();

    session.emit("Runtime.consoleAPICalled", console("log", "boot"));
    session.emit(
        "Runtime.exceptionThrown",
        json!({"timestamp": 0, "exceptionDetails": {
            "text": "Uncaught", "lineNumber": 3, "columnNumber": 9,
            "exception": {"type": "object", "subtype": "error",
                "description": "TypeError: cart.items is undefined"}
        }}),
    );

    let log = pipeline.log_path().to_path_buf();
    let stats = pipeline.stop().await.unwrap();
    assert_eq!(stats.written, 2);
    assert_eq!(stats.screenshots.fired, 1);
    assert_eq!(stats.screenshots.captured, 1);

    let files: Vec<_> = std::fs::read_dir(&shots).unwrap().collect();
    assert_eq!(files.len(), 1);

    let parsed = load(&log, Some(&shots)).unwrap();
    let exception = parsed.entries.iter().find(|e| e.severity == 5).unwrap();
    assert_eq!(exception.category, "type_error");
    assert!(exception.has_screenshot);
}
