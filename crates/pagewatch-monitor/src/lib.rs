//! # pagewatch Monitor
//!
//! Wires the protocol session to the structured session log.
//!
//! ## Features
//!
//! - Ordered event consumption: normalize, enrich, append
//! - Screenshot trigger for serious errors, with a cooldown
//! - Clean shutdown that drains queued events and closes the log

pub mod config;
pub mod error;
pub mod pipeline;
pub mod trigger;

pub use config::{MonitorConfig, TriggerConfig};
pub use error::MonitorError;
pub use pipeline::{MonitorPipeline, PipelineStats};
pub use trigger::{ScreenshotTrigger, TriggerStats};
