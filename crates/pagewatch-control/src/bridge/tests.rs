use super::*;
use crate::request::{
    ClickParams, EvaluateParams, InspectParams, NavigateParams, NetworkIdleParams,
    ScreenshotParams, ScrollParams, StyleParams, TypeParams, WaitForElementParams,
};
use base64::Engine;
use pagewatch_cdp::testing::ScriptedSession;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::AtomicUsize;
use tokio::time::Instant;

fn page() -> Arc<ScriptedSession> {
    let session = ScriptedSession::new();
    session.respond("DOM.getDocument", json!({"root": {"nodeId": 1}}));
    session.on("DOM.querySelector", |params| {
        match params["selector"].as_str().unwrap_or_default() {
            "#missing" => Ok(json!({"nodeId": 0})),
            "##bad" => Err(CdpError::Protocol {
                code: -32000,
                message: "DOM Error while querying".to_string(),
            }),
            _ => Ok(json!({"nodeId": 7})),
        }
    });
    session.respond(
        "DOM.getBoxModel",
        json!({"model": {"content": [10, 20, 30, 20, 30, 40, 10, 40], "width": 20, "height": 20}}),
    );
    session.respond(
        "DOM.resolveNode",
        json!({"object": {"type": "object", "objectId": "obj-7"}}),
    );
    session
}

fn bridge(session: &Arc<ScriptedSession>, dir: &Path) -> ControlBridge {
    ControlBridge::new(
        session.clone(),
        BridgeConfig::default(),
        ScreenshotStore::new(dir),
    )
}

fn click(selector: &str, timeout: u64) -> ControlRequest {
    ControlRequest::Click(ClickParams {
        selector: selector.to_string(),
        timeout: Some(timeout),
    })
}

fn evaluate(code: &str, timeout: Option<u64>) -> ControlRequest {
    ControlRequest::Evaluate(EvaluateParams {
        code: code.to_string(),
        return_by_value: true,
        timeout,
    })
}

fn wait_for(selector: &str, visible: bool, timeout: u64) -> ControlRequest {
    ControlRequest::WaitForElement(WaitForElementParams {
        selector: selector.to_string(),
        visible,
        timeout: Some(timeout),
    })
}

#[tokio::test]
async fn test_click_dispatches_press_and_release_at_center() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let bridge = bridge(&session, dir.path());

    let result = bridge.run(&click("#save", 1000)).await.unwrap();
    assert_eq!(result, json!({"selector": "#save", "x": 20.0, "y": 30.0}));

    let mouse: Vec<Value> = session
        .calls()
        .into_iter()
        .filter(|(m, _)| m == "Input.dispatchMouseEvent")
        .map(|(_, p)| p)
        .collect();
    assert_eq!(mouse.len(), 2);
    assert_eq!(mouse[0]["type"], "mousePressed");
    assert_eq!(mouse[1]["type"], "mouseReleased");
    assert_eq!(mouse[0]["button"], "left");
}

#[tokio::test(start_paused = true)]
async fn test_click_without_match_is_selector_error_and_next_click_works() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let bridge = bridge(&session, dir.path());

    let response = bridge.execute(click("#missing", 100)).await;
    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("selector"));
    assert_eq!(response.params["selector"], "#missing");
    assert!(response.error.unwrap().contains("#missing"));
    assert_eq!(session.call_count("Input.dispatchMouseEvent"), 0);

    let response = bridge.execute(click("#save", 100)).await;
    assert!(response.success);
    assert_eq!(session.call_count("Input.dispatchMouseEvent"), 2);
}

#[tokio::test]
async fn test_invalid_selector_fails_without_polling() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let bridge = bridge(&session, dir.path());

    let err = bridge.run(&click("##bad", 5000)).await.unwrap_err();
    match err {
        ControlError::Selector { selector, reason } => {
            assert_eq!(selector, "##bad");
            assert!(reason.contains("invalid selector"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(session.call_count("DOM.querySelector"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_element_times_out_on_budget() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let bridge = bridge(&session, dir.path());

    let started = Instant::now();
    let err = bridge.run(&wait_for("#missing", false, 100)).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), "timeout");
    assert!(err.to_string().contains("#missing"));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(150));

    // Nothing keeps polling after the call returned.
    let polls = session.call_count("DOM.querySelector");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(session.call_count("DOM.querySelector"), polls);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_element_that_appears_later() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    session.on("DOM.querySelector", move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) < 3 {
            Ok(json!({"nodeId": 0}))
        } else {
            Ok(json!({"nodeId": 12}))
        }
    });
    let bridge = bridge(&session, dir.path());

    let result = bridge.run(&wait_for("#late", false, 1000)).await.unwrap();
    assert_eq!(result["nodeId"], 12);
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_visible_element() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.respond(
        "CSS.getComputedStyleForNode",
        json!({"computedStyle": [{"name": "display", "value": "none"}]}),
    );
    let bridge = bridge(&session, dir.path());

    let err = bridge.run(&wait_for("#panel", true, 200)).await.unwrap_err();
    assert_eq!(err.kind(), "timeout");
    assert!(err.to_string().contains("visible"));

    session.respond(
        "CSS.getComputedStyleForNode",
        json!({"computedStyle": [
            {"name": "display", "value": "block"},
            {"name": "visibility", "value": "visible"},
            {"name": "opacity", "value": "1"}
        ]}),
    );
    let result = bridge.run(&wait_for("#panel", true, 200)).await.unwrap();
    assert_eq!(result["visible"], true);
}

#[tokio::test]
async fn test_evaluate_returns_value() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.respond(
        "Runtime.evaluate",
        json!({"result": {"type": "number", "value": 2, "description": "2"}}),
    );
    let bridge = bridge(&session, dir.path());

    let result = bridge.run(&evaluate("1 + 1", None)).await.unwrap();
    assert_eq!(result, json!({"type": "number", "value": 2}));
    let (_, params) = session
        .calls()
        .into_iter()
        .find(|(m, _)| m == "Runtime.evaluate")
        .unwrap();
    assert_eq!(params["expression"], "1 + 1");
    assert_eq!(params["awaitPromise"], true);
}

#[tokio::test]
async fn test_evaluate_exception_is_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.respond(
        "Runtime.evaluate",
        json!({
            "result": {"type": "object", "subtype": "error"},
            "exceptionDetails": {
                "exceptionId": 1, "text": "Uncaught", "lineNumber": 0, "columnNumber": 0,
                "exception": {"type": "object", "subtype": "error",
                    "description": "ReferenceError: foo is not defined"}
            }
        }),
    );
    let bridge = bridge(&session, dir.path());

    let response = bridge.execute(evaluate("foo()", None)).await;
    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("execution"));
    assert!(response.error.unwrap().contains("ReferenceError: foo is not defined"));
    assert_eq!(response.params["code"], "foo()");
}

#[tokio::test(start_paused = true)]
async fn test_evaluate_timeout_terminates_script_and_session_stays_usable() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.delay("Runtime.evaluate", Duration::from_secs(60));
    let bridge = bridge(&session, dir.path());

    let started = Instant::now();
    let err = bridge
        .run(&evaluate("while (true) {}", Some(100)))
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(err.kind(), "timeout");
    assert!(err.to_string().contains("while (true) {}"));
    assert_eq!(session.call_count("Runtime.terminateExecution"), 1);

    assert!(bridge.run(&click("#save", 1000)).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_requests_are_serialised() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.delay("Runtime.evaluate", Duration::from_millis(100));
    session.respond(
        "Runtime.evaluate",
        json!({"result": {"type": "boolean", "value": true}}),
    );
    let bridge = bridge(&session, dir.path());

    let first = evaluate("a()", None);
    let second = evaluate("b()", None);
    let started = Instant::now();
    let (a, b) = tokio::join!(bridge.run(&first), bridge.run(&second));
    assert!(a.is_ok() && b.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_network_idle_waits_for_quiet_period() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.set_inflight(2);
    let bridge = bridge(&session, dir.path());

    let network = session.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        network.set_inflight(0);
    });

    let started = Instant::now();
    let result = bridge
        .run(&ControlRequest::WaitForNetworkIdle(NetworkIdleParams {
            timeout: Some(2000),
            idle_time: Some(200),
        }))
        .await
        .unwrap();
    assert_eq!(result["idleTime"], 200);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn test_network_idle_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.set_inflight(1);
    let bridge = bridge(&session, dir.path());

    let err = bridge
        .run(&ControlRequest::WaitForNetworkIdle(NetworkIdleParams {
            timeout: Some(150),
            idle_time: None,
        }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "timeout");
    assert!(err.to_string().contains("1 requests in flight"));
}

#[tokio::test]
async fn test_navigate_waits_for_load_event() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let events = session.clone();
    session.on("Page.navigate", move |_| {
        events.emit("Page.frameNavigated", json!({"frame": {"id": "F"}}));
        events.emit("Page.loadEventFired", json!({"timestamp": 1.0}));
        Ok(json!({"frameId": "F", "loaderId": "L"}))
    });
    let bridge = bridge(&session, dir.path());

    let result = bridge
        .run(&ControlRequest::Navigate(NavigateParams {
            url: "https://app.test/".to_string(),
            wait_for_load: true,
            timeout: Some(1000),
        }))
        .await
        .unwrap();
    assert_eq!(result["loaded"], true);
    assert_eq!(result["frameId"], "F");
}

#[tokio::test(start_paused = true)]
async fn test_navigate_failures() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.respond(
        "Page.navigate",
        json!({"frameId": "F", "loaderId": "L", "errorText": "net::ERR_NAME_NOT_RESOLVED"}),
    );
    let bridge = bridge(&session, dir.path());
    let navigate = |url: &str| {
        ControlRequest::Navigate(NavigateParams {
            url: url.to_string(),
            wait_for_load: true,
            timeout: Some(200),
        })
    };

    let response = bridge.execute(navigate("https://nope.test/")).await;
    assert_eq!(response.error_kind.as_deref(), Some("navigation"));
    assert!(response.error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));
    assert_eq!(response.params["url"], "https://nope.test/");

    // Accepted, but the load event never comes.
    session.respond("Page.navigate", json!({"frameId": "F", "loaderId": "L"}));
    let err = bridge.run(&navigate("https://slow.test/")).await.unwrap_err();
    assert_eq!(err.kind(), "timeout");
    assert!(err.to_string().contains("slow.test"));
}

#[tokio::test]
async fn test_type_with_clear() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let bridge = bridge(&session, dir.path());

    let result = bridge
        .run(&ControlRequest::Type(TypeParams {
            selector: "#q".to_string(),
            text: "héllo".to_string(),
            clear: true,
            timeout: Some(1000),
        }))
        .await
        .unwrap();
    assert_eq!(result["typed"], 5);

    let methods: Vec<String> = session
        .calls()
        .into_iter()
        .map(|(m, _)| m)
        .filter(|m| !m.starts_with("DOM.getDocument") && m != "DOM.querySelector")
        .collect();
    assert_eq!(
        methods,
        [
            "DOM.focus",
            "DOM.resolveNode",
            "Runtime.callFunctionOn",
            "Input.insertText"
        ]
    );
}

#[tokio::test]
async fn test_scroll() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.respond(
        "Runtime.evaluate",
        json!({"result": {"type": "object", "value": {"x": 0, "y": 400}}}),
    );
    let bridge = bridge(&session, dir.path());

    let result = bridge
        .run(&ControlRequest::Scroll(ScrollParams {
            selector: None,
            x: None,
            y: Some(400.0),
            behavior: Default::default(),
            timeout: None,
        }))
        .await
        .unwrap();
    assert_eq!(result["position"]["y"], 400);
    let (_, params) = session
        .calls()
        .into_iter()
        .find(|(m, _)| m == "Runtime.evaluate")
        .unwrap();
    assert!(params["expression"].as_str().unwrap().contains("left: window.scrollX, top: 400"));

    let err = bridge
        .run(&ControlRequest::Scroll(ScrollParams {
            selector: None,
            x: None,
            y: None,
            behavior: Default::default(),
            timeout: None,
        }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}

#[tokio::test]
async fn test_inspect_reports_per_property() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.respond(
        "Runtime.callFunctionOn",
        json!({"result": {"type": "object", "value": {
            "values": {"id": "save"},
            "errors": {"bogus": "unknown property"}
        }}}),
    );
    let bridge = bridge(&session, dir.path());
    let inspect = |selector: &str| {
        ControlRequest::Inspect(InspectParams {
            selector: selector.to_string(),
            properties: vec!["id".to_string(), "bogus".to_string()],
            timeout: None,
        })
    };

    let result = bridge.run(&inspect("#save")).await.unwrap();
    assert_eq!(result["found"], true);
    assert_eq!(result["properties"]["id"], "save");
    assert_eq!(result["errors"]["bogus"], "unknown property");

    let result = bridge.run(&inspect("#missing")).await.unwrap();
    assert_eq!(result["found"], false);
    assert_eq!(result["errors"]["id"], "no element matches selector");
    assert_eq!(result["errors"]["bogus"], "no element matches selector");
}

#[tokio::test]
async fn test_computed_styles() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.respond(
        "CSS.getComputedStyleForNode",
        json!({"computedStyle": [
            {"name": "color", "value": "rgb(0, 0, 0)"},
            {"name": "display", "value": "flex"}
        ]}),
    );
    let bridge = bridge(&session, dir.path());

    let result = bridge
        .run(&ControlRequest::ComputedStyles(StyleParams {
            selector: "main".to_string(),
            properties: vec!["display".to_string(), "colour".to_string()],
            timeout: None,
        }))
        .await
        .unwrap();
    assert_eq!(result["properties"], json!({"display": "flex"}));
    assert_eq!(result["errors"]["colour"], "unknown style property");
}

#[tokio::test]
async fn test_screenshot_written_to_store() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let png = b"\x89PNG fake image";
    session.respond(
        "Page.captureScreenshot",
        json!({"data": base64::engine::general_purpose::STANDARD.encode(png)}),
    );
    let bridge = bridge(&session, dir.path());

    let result = bridge
        .run(&ControlRequest::Screenshot(ScreenshotParams {
            context: Some("checkout".to_string()),
            ..Default::default()
        }))
        .await
        .unwrap();
    let path = result["path"].as_str().unwrap();
    assert!(path.ends_with("-checkout.png"));
    assert_eq!(std::fs::read(path).unwrap(), png);

    let info = bridge
        .capture_at("2024-05-01T10:20:30.500Z", "error")
        .await
        .unwrap();
    assert_eq!(info.stamp.as_deref(), Some("2024-05-01T10-20-30"));
    assert_eq!(bridge.screenshots().list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_connection_error_reconnects_before_next_action() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = dropped.clone();
    session.on("Runtime.evaluate", move |_| {
        if flag.swap(true, Ordering::SeqCst) {
            Ok(json!({"result": {"type": "number", "value": 1}}))
        } else {
            Err(CdpError::WebSocket("connection reset".to_string()))
        }
    });
    let bridge = bridge(&session, dir.path());

    let response = bridge.execute(evaluate("1", None)).await;
    assert_eq!(response.error_kind.as_deref(), Some("connection"));
    assert_eq!(session.reconnect_count(), 0);

    let response = bridge.execute(evaluate("1", None)).await;
    assert!(response.success);
    assert_eq!(session.reconnect_count(), 1);

    let response = bridge.execute(evaluate("1", None)).await;
    assert!(response.success);
    assert_eq!(session.reconnect_count(), 1);
}

#[tokio::test]
async fn test_failed_reconnect_rejects_until_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    session.disconnect();
    session.fail_reconnects(true);
    let bridge = bridge(&session, dir.path());

    let err = bridge.run(&click("#save", 100)).await.unwrap_err();
    assert!(err.is_connection_error());
    assert!(err.to_string().contains("reconnect failed"));
    assert_eq!(session.call_count("DOM.getDocument"), 0);

    session.fail_reconnects(false);
    assert!(bridge.run(&click("#save", 100)).await.is_ok());
    assert_eq!(session.reconnect_count(), 2);
}

#[tokio::test]
async fn test_execute_value_rejects_bad_body() {
    let dir = tempfile::tempdir().unwrap();
    let session = page();
    let bridge = bridge(&session, dir.path());

    let response = bridge
        .execute_value(json!({"action": "teleport", "to": "mars"}))
        .await;
    assert!(!response.success);
    assert_eq!(response.error_kind.as_deref(), Some("invalid_request"));
    assert_eq!(response.params["to"], "mars");
    assert!(session.calls().is_empty());

    let response = bridge.call_tool("click", json!({"selector": "#save"})).await;
    assert!(response.success);
}
