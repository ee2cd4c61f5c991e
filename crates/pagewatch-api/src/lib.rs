//! # pagewatch API
//!
//! HTTP surface of a monitoring session.
//!
//! - **Control**: `POST /control` and per-tool `POST /tools/{name}`, answered
//!   with the control bridge's `{success, result | error, ...}` bodies
//! - **Logs**: read-only views over the session log, rescanned on each request
//! - **Stream**: new entries pushed over a WebSocket as the watcher finds them
//! - **Health**: session connectivity and log presence

pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use http::routes::create_router;
pub use server::ApiServer;
pub use state::AppState;
