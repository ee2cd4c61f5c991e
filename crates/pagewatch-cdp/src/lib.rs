//! Protocol session for pagewatch.
//!
//! Holds the single live Chrome DevTools Protocol connection to a page
//! target. A connection actor owns the WebSocket; commands are queued to it
//! and events are fanned out to subscribers in emission order.
//!
//! ```text
//! ┌─────────────────┐    WebSocket     ┌──────────────────┐
//! │   CdpSession    │ ◄──────────────► │   Chrome/Edge    │
//! │  (actor task)   │       CDP        │   page target    │
//! └─────────────────┘                  └──────────────────┘
//! ```
//!
//! Start the browser with remote debugging enabled:
//!
//! ```bash
//! google-chrome --remote-debugging-port=9222
//! ```

mod client;
mod connection;
mod error;
mod network;
mod protocol;
mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{CdpSession, CdpSessionConfig, ENABLED_DOMAINS, discover_page};
pub use error::CdpError;
pub use network::InflightTracker;
pub use protocol::*;
pub use session::ProtocolSession;
