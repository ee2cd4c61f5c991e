//! Control bridge error types.

use pagewatch_cdp::CdpError;
use thiserror::Error;

/// Failure of a single control action.
///
/// Every variant is recovered at the bridge boundary and reported as a
/// failure response; see [`ControlError::kind`] for the wire name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// No element matches, or the selector itself is invalid.
    #[error("Selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    /// A bounded wait ran out.
    #[error("Timed out after {timeout_ms}ms waiting for {waiting_for}")]
    Timeout { waiting_for: String, timeout_ms: u64 },

    /// The target rejected a command or a script threw.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The protocol session is unusable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The page reported a navigation failure.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Unknown action or malformed parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ControlError {
    pub fn selector(selector: &str, reason: impl Into<String>) -> Self {
        ControlError::Selector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(selector: &str) -> Self {
        Self::selector(selector, "no element matches")
    }

    /// Stable name reported as `errorKind`.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlError::Selector { .. } => "selector",
            ControlError::Timeout { .. } => "timeout",
            ControlError::Execution(_) => "execution",
            ControlError::Connection(_) => "connection",
            ControlError::Navigation { .. } => "navigation",
            ControlError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, ControlError::Connection(_))
    }
}

impl From<CdpError> for ControlError {
    fn from(e: CdpError) -> Self {
        if e.is_connection_error() {
            return ControlError::Connection(e.to_string());
        }
        match e {
            CdpError::Protocol { message, .. } => ControlError::Execution(message),
            CdpError::Timeout(method) => ControlError::Timeout {
                waiting_for: method,
                timeout_ms: 0,
            },
            other => ControlError::Execution(other.to_string()),
        }
    }
}
