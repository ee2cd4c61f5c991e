//! Navigation and screenshots.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{SecondsFormat, Utc};
use pagewatch_cdp::{CdpEvent, ScreenshotFormat};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::ControlError;
use crate::request::{NavigateParams, ScreenshotParams};
use crate::screenshot::ScreenshotInfo;

use super::ControlBridge;
use super::wait::Deadline;

impl ControlBridge {
    pub(super) async fn navigate(
        &self,
        deadline: &Deadline,
        params: &NavigateParams,
    ) -> Result<Value, ControlError> {
        let url = params.url.trim();
        if url.is_empty() {
            return Err(ControlError::InvalidRequest("url must not be empty".to_string()));
        }

        // Subscribe first so the load event cannot slip past.
        let mut events = params.wait_for_load.then(|| self.session.subscribe());

        let result = match self
            .call(deadline, "Page.navigate", json!({"url": url}))
            .await
        {
            Ok(result) => result,
            Err(ControlError::Execution(reason)) => {
                return Err(ControlError::Navigation {
                    url: url.to_string(),
                    reason,
                });
            }
            Err(e) => return Err(e),
        };

        if let Some(reason) = result["errorText"].as_str().filter(|s| !s.is_empty()) {
            return Err(ControlError::Navigation {
                url: url.to_string(),
                reason: reason.to_string(),
            });
        }

        // Same-document navigations carry no loader and fire no load event.
        let loader_id = result["loaderId"].as_str();
        let mut loaded = false;
        if let (Some(events), Some(_)) = (events.as_mut(), loader_id) {
            wait_for_load(deadline, events, url).await?;
            loaded = true;
        }

        info!("Navigated to {}", url);
        Ok(json!({
            "url": url,
            "frameId": result["frameId"],
            "loaderId": loader_id,
            "loaded": loaded,
        }))
    }

    pub(super) async fn screenshot(
        &self,
        deadline: &Deadline,
        params: &ScreenshotParams,
    ) -> Result<Value, ControlError> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let context = params.context.as_deref().unwrap_or("manual");
        let info = self
            .capture(deadline, &timestamp, context, params.full_page)
            .await?;
        Ok(json!({
            "path": info.path,
            "fileName": info.name,
            "bytes": info.size,
            "stamp": info.stamp,
            "timestamp": timestamp,
        }))
    }

    /// Capture the current frame as PNG and store it under `timestamp`.
    pub(super) async fn capture(
        &self,
        deadline: &Deadline,
        timestamp: &str,
        context: &str,
        full_page: bool,
    ) -> Result<ScreenshotInfo, ControlError> {
        let result = self
            .call(
                deadline,
                "Page.captureScreenshot",
                json!({
                    "format": ScreenshotFormat::Png,
                    "captureBeyondViewport": full_page,
                }),
            )
            .await?;

        let data = result["data"].as_str().ok_or_else(|| {
            ControlError::Execution("Page.captureScreenshot returned no image data".to_string())
        })?;
        let png = BASE64
            .decode(data)
            .map_err(|e| ControlError::Execution(format!("Screenshot is not valid base64: {}", e)))?;

        self.screenshots
            .save(timestamp, context, &png)
            .await
            .map_err(|e| ControlError::Execution(format!("Failed to write screenshot: {}", e)))
    }
}

async fn wait_for_load(
    deadline: &Deadline,
    events: &mut mpsc::UnboundedReceiver<CdpEvent>,
    url: &str,
) -> Result<(), ControlError> {
    let load = async {
        while let Some(event) = events.recv().await {
            if event.method == "Page.loadEventFired" {
                return Ok(());
            }
        }
        Err(ControlError::Connection(
            "event stream closed while waiting for page load".to_string(),
        ))
    };
    match tokio::time::timeout_at(deadline.at(), load).await {
        Ok(result) => result,
        Err(_) => Err(deadline.timeout(format!("load of {}", url))),
    }
}
