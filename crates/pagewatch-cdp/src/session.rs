//! The protocol session seam shared by the control bridge and the event pipeline.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::CdpError;
use crate::protocol::CdpEvent;

/// One live connection to a debuggable page target.
///
/// Commands may be issued from several tasks; events are delivered to every
/// subscriber in the order the target emitted them.
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// Send a command and wait for its response.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError>;

    /// Register a new event subscriber.
    ///
    /// The receiver keeps working across reconnects. Dropping it unsubscribes.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<CdpEvent>;

    /// Number of page network requests started but not yet finished or failed.
    fn inflight_requests(&self) -> usize;

    /// Whether the underlying transport is currently open.
    fn is_connected(&self) -> bool;

    /// Drop the current transport (if any) and establish a fresh one.
    async fn reconnect(&self) -> Result<(), CdpError>;

    /// Close the transport, failing any command still waiting for a response.
    async fn close(&self);
}
