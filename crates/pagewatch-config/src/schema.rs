//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub screenshots: ScreenshotConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Connection to the debuggable browser target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Remote debugging HTTP endpoint (e.g. `http://127.0.0.1:9222`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Maximum time to wait for a single CDP command response.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            command_timeout_ms: default_command_timeout(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9222".to_string()
}

fn default_command_timeout() -> u64 {
    30000
}

fn default_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_delay() -> u64 {
    500
}

/// Structured session log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory holding one `session-*.log` file per session.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Lowest level written to the log (`debug`, `info`, `warn`, `error`).
    #[serde(default = "default_min_level")]
    pub min_level: String,

    /// Entry types to capture. Empty captures every type.
    #[serde(default)]
    pub types: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            min_level: default_min_level(),
            types: Vec::new(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    data_dir().join("logs")
}

fn default_min_level() -> String {
    "debug".to_string()
}

/// Screenshot capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    #[serde(default = "default_screenshot_dir")]
    pub dir: PathBuf,

    /// Capture automatically when a qualifying error entry is logged.
    #[serde(default = "default_true")]
    pub on_error: bool,

    /// Lowest severity that fires the automatic capture.
    #[serde(default = "default_min_severity")]
    pub min_severity: u8,

    /// Minimum spacing between two automatic captures.
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            dir: default_screenshot_dir(),
            on_error: default_true(),
            min_severity: default_min_severity(),
            cooldown_ms: default_cooldown(),
        }
    }
}

fn default_screenshot_dir() -> PathBuf {
    data_dir().join("screenshots")
}

fn default_min_severity() -> u8 {
    4
}

fn default_cooldown() -> u64 {
    2000
}

/// Control bridge timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Timeout applied when a request does not carry its own.
    #[serde(default = "default_control_timeout")]
    pub default_timeout_ms: u64,

    /// Sleep between two checks of a polled condition.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Quiet period required by `wait-for-network-idle` when none is given.
    #[serde(default = "default_network_idle")]
    pub network_idle_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_control_timeout(),
            poll_interval_ms: default_poll_interval(),
            network_idle_ms: default_network_idle(),
        }
    }
}

fn default_control_timeout() -> u64 {
    30000
}

fn default_poll_interval() -> u64 {
    50
}

fn default_network_idle() -> u64 {
    500
}

/// HTTP control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_true() -> bool {
    true
}

/// Base data directory (`~/.pagewatch`).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".pagewatch"))
        .unwrap_or_else(|| PathBuf::from(".pagewatch"))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
