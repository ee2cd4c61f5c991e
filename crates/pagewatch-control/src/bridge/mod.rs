//! The control bridge.
//!
//! One entry point, [`ControlBridge::execute`], dispatches a
//! [`ControlRequest`] to the protocol session. Requests are served one at a
//! time; every protocol call and every wait is bounded by the request's own
//! deadline, so a timed-out action never leaves anything behind that could
//! block the next one.

mod dom;
mod input;
mod navigation;
mod script;
mod wait;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pagewatch_cdp::{CdpError, ProtocolSession};
use pagewatch_config::ControlConfig;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::error::ControlError;
use crate::request::{ControlRequest, ControlResponse};
use crate::screenshot::{ScreenshotInfo, ScreenshotStore};

use wait::Deadline;

/// Timing knobs of the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Budget of a request that does not carry its own timeout.
    pub default_timeout: Duration,
    pub poll_interval: Duration,
    /// Quiet period for `wait-for-network-idle` when none is given.
    pub network_idle: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from(&ControlConfig::default())
    }
}

impl From<&ControlConfig> for BridgeConfig {
    fn from(config: &ControlConfig) -> Self {
        Self {
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            network_idle: Duration::from_millis(config.network_idle_ms),
        }
    }
}

/// Serialised page control over a shared protocol session.
pub struct ControlBridge {
    session: Arc<dyn ProtocolSession>,
    config: BridgeConfig,
    screenshots: ScreenshotStore,
    /// Held for the whole of one request.
    queue: Mutex<()>,
    /// Set after a connection failure; the next request reconnects first.
    needs_reconnect: AtomicBool,
}

impl ControlBridge {
    pub fn new(
        session: Arc<dyn ProtocolSession>,
        config: BridgeConfig,
        screenshots: ScreenshotStore,
    ) -> Self {
        Self {
            session,
            config,
            screenshots,
            queue: Mutex::new(()),
            needs_reconnect: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<dyn ProtocolSession> {
        &self.session
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn screenshots(&self) -> &ScreenshotStore {
        &self.screenshots
    }

    /// Execute a request. Failures are reported in the response, never
    /// returned as `Err`.
    pub async fn execute(&self, request: ControlRequest) -> ControlResponse {
        let result = self.run(&request).await;
        ControlResponse::from_result(result, &request)
    }

    /// Parse and execute a raw request body.
    pub async fn execute_value(&self, body: Value) -> ControlResponse {
        match ControlRequest::from_value(body.clone()) {
            Ok(request) => self.execute(request).await,
            Err(e) => {
                warn!("Rejected control request: {}", e);
                let params = match body {
                    Value::Object(map) => map,
                    _ => Default::default(),
                };
                ControlResponse::failure(&e, params)
            }
        }
    }

    /// Execute a tool call; the tool name is the action.
    pub async fn call_tool(&self, name: &str, input: Value) -> ControlResponse {
        match ControlRequest::from_tool_call(name, input.clone()) {
            Ok(request) => self.execute(request).await,
            Err(e) => {
                let mut params = match input {
                    Value::Object(map) => map,
                    _ => Default::default(),
                };
                params.insert("action".to_string(), Value::String(name.to_string()));
                ControlResponse::failure(&e, params)
            }
        }
    }

    /// Execute a request, waiting for any request ahead of it.
    ///
    /// The request's timeout starts once it is its turn.
    pub async fn run(&self, request: &ControlRequest) -> Result<Value, ControlError> {
        let _turn = self.queue.lock().await;
        self.ensure_connected().await?;

        let budget = request
            .timeout_ms()
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_timeout);
        let deadline = Deadline::after(budget);
        debug!("Control action {} (timeout {}ms)", request.action(), deadline.budget_ms());

        let result = match request {
            ControlRequest::Navigate(p) => self.navigate(&deadline, p).await,
            ControlRequest::Click(p) => self.click(&deadline, p).await,
            ControlRequest::Type(p) => self.type_text(&deadline, p).await,
            ControlRequest::Scroll(p) => self.scroll(&deadline, p).await,
            ControlRequest::Inspect(p) => self.inspect(&deadline, p).await,
            ControlRequest::ComputedStyles(p) => self.computed_styles(&deadline, p).await,
            ControlRequest::Evaluate(p) => self.evaluate(&deadline, p).await,
            ControlRequest::WaitForElement(p) => self.wait_for_element(&deadline, p).await,
            ControlRequest::WaitForNetworkIdle(p) => self.wait_for_network_idle(&deadline, p).await,
            ControlRequest::Screenshot(p) => self.screenshot(&deadline, p).await,
        };
        self.note_outcome(request.action(), &result);
        result
    }

    /// Capture a screenshot named after `timestamp` rather than the capture
    /// time, queued behind any running request.
    pub async fn capture_at(
        &self,
        timestamp: &str,
        context: &str,
    ) -> Result<ScreenshotInfo, ControlError> {
        let _turn = self.queue.lock().await;
        self.ensure_connected().await?;
        let deadline = Deadline::after(self.config.default_timeout);
        let result = self.capture(&deadline, timestamp, context, false).await;
        self.note_outcome("screenshot", &result);
        result
    }

    fn note_outcome<T>(&self, action: &str, result: &Result<T, ControlError>) {
        match result {
            Ok(_) => {}
            Err(e) if e.is_connection_error() => {
                warn!("{} lost the protocol session: {}", action, e);
                self.needs_reconnect.store(true, Ordering::SeqCst);
            }
            Err(e) => debug!("{} failed: {}", action, e),
        }
    }

    async fn ensure_connected(&self) -> Result<(), ControlError> {
        if !self.needs_reconnect.load(Ordering::SeqCst) && self.session.is_connected() {
            return Ok(());
        }
        info!("Reconnecting protocol session before the next action");
        match self.session.reconnect().await {
            Ok(()) => {
                self.needs_reconnect.store(false, Ordering::SeqCst);
                info!("Protocol session reconnected");
                Ok(())
            }
            Err(e) => {
                self.needs_reconnect.store(true, Ordering::SeqCst);
                Err(ControlError::Connection(format!("reconnect failed: {}", e)))
            }
        }
    }

    /// One protocol call bounded by the deadline.
    async fn call(
        &self,
        deadline: &Deadline,
        method: &str,
        params: Value,
    ) -> Result<Value, ControlError> {
        trace!("-> {}", method);
        match tokio::time::timeout_at(deadline.at(), self.session.call(method, Some(params))).await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(CdpError::Timeout(_))) | Err(_) => Err(deadline.timeout(method)),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests;
