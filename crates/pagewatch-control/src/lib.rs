//! # pagewatch Control
//!
//! The control bridge: page actions requested by a client or an assistant,
//! executed one at a time over the shared protocol session.
//!
//! ```json
//! {"action": "wait-for-element", "selector": "#results", "visible": true, "timeout": 5000}
//! ```
//!
//! Successful actions answer `{success: true, result, timestamp}`; failures
//! answer `{success: false, error, errorKind, ...params}` where `errorKind`
//! is one of `selector`, `timeout`, `execution`, `connection`,
//! `navigation` or `invalid_request`.

mod bridge;
mod error;
mod request;
mod screenshot;
mod tools;

pub use bridge::{BridgeConfig, ControlBridge};
pub use error::ControlError;
pub use request::{
    ClickParams, ControlRequest, ControlResponse, EvaluateParams, InspectParams, NavigateParams,
    NetworkIdleParams, ScreenshotParams, ScrollBehavior, ScrollParams, StyleParams, TypeParams,
    WaitForElementParams,
};
pub use screenshot::{ScreenshotInfo, ScreenshotStore};
pub use tools::{ToolDefinition, control_tools};
