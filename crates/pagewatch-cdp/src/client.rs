//! CDP session over a page WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use pagewatch_config::BrowserConfig;

use crate::connection::{Command, ConnectionHandle, PendingCall, Shared};
use crate::error::CdpError;
use crate::protocol::{BrowserVersion, CdpEvent, PageInfo};
use crate::session::ProtocolSession;

/// Domains enabled on every (re)connect.
pub const ENABLED_DOMAINS: &[&str] = &[
    "Runtime",
    "Log",
    "Network",
    "Page",
    "Performance",
    "PerformanceTimeline",
    "Security",
    "DOM",
    "CSS",
];

/// Session configuration.
#[derive(Debug, Clone)]
pub struct CdpSessionConfig {
    /// Remote debugging HTTP endpoint.
    pub endpoint: String,
    pub command_timeout: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Default for CdpSessionConfig {
    fn default() -> Self {
        Self::from(&BrowserConfig::default())
    }
}

impl From<&BrowserConfig> for CdpSessionConfig {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        }
    }
}

/// The live protocol session to one page target.
///
/// Commands are funneled to a single connection actor; events are fanned out
/// to subscribers that survive reconnects.
pub struct CdpSession {
    config: CdpSessionConfig,
    shared: Arc<Shared>,
    connection: Mutex<Option<ConnectionHandle>>,
    request_id: AtomicU64,
    target: Mutex<Option<PageInfo>>,
}

impl CdpSession {
    /// Create a disconnected session. Call [`ProtocolSession::reconnect`] or use
    /// [`CdpSession::connect`] to open it.
    pub fn new(config: CdpSessionConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
            connection: Mutex::new(None),
            request_id: AtomicU64::new(1),
            target: Mutex::new(None),
        }
    }

    /// Discover a page target at the endpoint, connect and enable domains.
    ///
    /// ```rust,ignore
    /// let session = CdpSession::connect(CdpSessionConfig::default()).await?;
    /// let rx = session.subscribe();
    /// ```
    pub async fn connect(config: CdpSessionConfig) -> Result<Self, CdpError> {
        let session = Self::new(config);
        session.establish().await?;
        Ok(session)
    }

    /// The page target currently attached, if any.
    pub fn target(&self) -> Option<PageInfo> {
        self.target.lock().clone()
    }

    async fn establish(&self) -> Result<(), CdpError> {
        let page = discover_page(&self.config.endpoint).await?;
        let ws_url = page
            .web_socket_debugger_url
            .clone()
            .ok_or_else(|| CdpError::PageNotFound(format!("{} has no debugger URL", page.id)))?;
        url::Url::parse(&ws_url)?;

        let (ws, _) = tokio_tungstenite::connect_async(ws_url.as_str())
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        self.shared.inflight.lock().clear();
        let handle = ConnectionHandle::spawn(ws, self.shared.clone());
        *self.connection.lock() = Some(handle);
        info!("Attached to page {} ({})", page.id, page.url);
        *self.target.lock() = Some(page);

        self.enable_domains().await
    }

    /// Enable every domain the event normalizer maps.
    async fn enable_domains(&self) -> Result<(), CdpError> {
        for domain in ENABLED_DOMAINS {
            let params = match *domain {
                "PerformanceTimeline" => Some(json!({
                    "eventTypes": ["largest-contentful-paint", "layout-shift"]
                })),
                _ => None,
            };
            self.call(&format!("{}.enable", domain), params).await?;
        }
        debug!("Enabled CDP domains: {}", ENABLED_DOMAINS.join(", "));
        Ok(())
    }

    fn take_connection(&self) -> Option<ConnectionHandle> {
        self.connection.lock().take()
    }
}

/// Find the first page target, creating one if the browser has none.
pub async fn discover_page(endpoint: &str) -> Result<PageInfo, CdpError> {
    let version_url = format!("{}/json/version", endpoint);
    debug!("Fetching browser version from {}", version_url);

    let version: BrowserVersion = reqwest::get(&version_url)
        .await
        .map_err(|e| CdpError::BrowserNotAvailable(format!("{}: {}", endpoint, e)))?
        .json()
        .await
        .map_err(|e| CdpError::BrowserNotAvailable(format!("{}: {}", endpoint, e)))?;
    debug!(
        "Connected to browser: {} (protocol {})",
        version.browser, version.protocol_version
    );

    let pages: Vec<PageInfo> = reqwest::get(format!("{}/json/list", endpoint))
        .await?
        .json()
        .await?;

    if let Some(page) = pages
        .into_iter()
        .find(|p| p.page_type == "page" && p.web_socket_debugger_url.is_some())
    {
        return Ok(page);
    }

    // Chrome requires PUT method for /json/new
    let client = reqwest::Client::new();
    let page: PageInfo = client
        .put(format!("{}/json/new", endpoint))
        .send()
        .await?
        .json()
        .await?;
    debug!("Created new page: {} - {}", page.id, page.url);
    Ok(page)
}

#[async_trait]
impl ProtocolSession for CdpSession {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        let cmd_tx = {
            let conn = self.connection.lock();
            match conn.as_ref() {
                Some(handle) if handle.is_connected() => handle.cmd_tx.clone(),
                _ => return Err(CdpError::SessionClosed),
            }
        };

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        cmd_tx
            .send(Command::Call {
                id,
                method: method.to_string(),
                params,
                reply,
            })
            .map_err(|_| CdpError::SessionClosed)?;
        let pending = PendingCall::new(id, cmd_tx);

        match tokio::time::timeout(self.config.command_timeout, rx).await {
            Ok(reply) => {
                pending.resolved();
                reply.unwrap_or(Err(CdpError::SessionClosed))
            }
            Err(_) => Err(CdpError::Timeout(format!("Request {} timed out", method))),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<CdpEvent> {
        self.shared.subscribe()
    }

    fn inflight_requests(&self) -> usize {
        self.shared.inflight.lock().len()
    }

    fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.is_connected())
    }

    async fn reconnect(&self) -> Result<(), CdpError> {
        if let Some(old) = self.take_connection() {
            old.shutdown().await;
        }

        let attempts = self.config.reconnect_attempts.max(1);
        let mut last_error = CdpError::SessionClosed;
        for attempt in 1..=attempts {
            match self.establish().await {
                Ok(()) => {
                    info!("CDP session connected (attempt {}/{})", attempt, attempts);
                    return Ok(());
                }
                Err(e) => {
                    warn!("CDP connect attempt {}/{} failed: {}", attempt, attempts, e);
                    if let Some(partial) = self.take_connection() {
                        partial.shutdown().await;
                    }
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.reconnect_delay).await;
            }
        }
        Err(last_error)
    }

    async fn close(&self) {
        if let Some(handle) = self.take_connection() {
            handle.shutdown().await;
            info!("CDP session closed");
        }
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        if let Some(handle) = self.connection.get_mut().take() {
            handle.task.abort();
        }
    }
}
