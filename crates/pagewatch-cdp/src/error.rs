//! CDP error types.

use thiserror::Error;

/// CDP session errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to connect to the browser.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Browser not found or not running with remote debugging.
    #[error("Browser not available at {0}. Start it with: chrome --remote-debugging-port=9222")]
    BrowserNotAvailable(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol error returned by the target.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (for endpoint discovery).
    #[error("HTTP error: {0}")]
    Http(String),

    /// No page target could be found or created.
    #[error("Page not found: {0}")]
    PageNotFound(String),

    /// Command response did not arrive in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The connection is gone.
    #[error("Session closed")]
    SessionClosed,
}

impl CdpError {
    /// Whether the session is unusable until it reconnects.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            CdpError::ConnectionFailed(_)
                | CdpError::BrowserNotAvailable(_)
                | CdpError::WebSocket(_)
                | CdpError::Http(_)
                | CdpError::SessionClosed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}
