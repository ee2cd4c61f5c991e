//! Monitor configuration.

use std::path::PathBuf;
use std::time::Duration;

use pagewatch_config::{Config, ScreenshotConfig};
use pagewatch_log::LogFilter;

use crate::error::MonitorError;

/// When the screenshot trigger fires.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub enabled: bool,
    /// Lowest severity that fires a capture.
    pub min_severity: u8,
    /// Minimum spacing between two captures.
    pub cooldown: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::from(&ScreenshotConfig::default())
    }
}

impl From<&ScreenshotConfig> for TriggerConfig {
    fn from(config: &ScreenshotConfig) -> Self {
        Self {
            enabled: config.on_error,
            min_severity: config.min_severity,
            cooldown: Duration::from_millis(config.cooldown_ms),
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Directory the session log is created in.
    pub log_dir: PathBuf,
    /// Directory screenshots are indexed from for `hasScreenshot`.
    pub screenshot_dir: Option<PathBuf>,
    pub filter: LogFilter,
    /// Page URL recorded in the session metadata.
    pub target_url: Option<String>,
    pub trigger: TriggerConfig,
}

impl MonitorConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            screenshot_dir: None,
            filter: LogFilter::default(),
            target_url: None,
            trigger: TriggerConfig::default(),
        }
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    /// Create from config.
    pub fn from_config(config: &Config) -> Result<Self, MonitorError> {
        let filter = LogFilter::try_from(&config.logging)
            .map_err(|e| MonitorError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            log_dir: config.logging.log_dir.clone(),
            screenshot_dir: Some(config.screenshots.dir.clone()),
            filter,
            target_url: None,
            trigger: TriggerConfig::from(&config.screenshots),
        })
    }
}
