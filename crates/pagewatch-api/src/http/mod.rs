//! HTTP interface module.
//!
//! Provides endpoints for:
//! - Control actions and tool calls
//! - Read-only log views and the screenshot listing
//! - A live entry stream
//! - Health checks

pub mod control;
pub mod logs;
pub mod monitoring;
pub mod routes;

pub(crate) mod stream;
