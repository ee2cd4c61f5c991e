//! Verbosity filter applied to normalized entries.

use serde::{Deserialize, Serialize};

use pagewatch_config::LoggingConfig;

use crate::entry::{LogLevel, LogType, RawEntry};
use crate::error::LogError;

/// Which entries are written to the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub min_level: LogLevel,
    /// Captured types. Empty captures every type.
    #[serde(default)]
    pub types: Vec<LogType>,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            types: Vec::new(),
        }
    }
}

impl LogFilter {
    pub fn allows(&self, entry: &RawEntry) -> bool {
        entry.level >= self.min_level
            && (self.types.is_empty() || self.types.contains(&entry.entry_type))
    }
}

impl TryFrom<&LoggingConfig> for LogFilter {
    type Error = LogError;

    fn try_from(config: &LoggingConfig) -> Result<Self, Self::Error> {
        let min_level = config
            .min_level
            .parse::<LogLevel>()
            .map_err(LogError::InvalidFilter)?;
        let types = config
            .types
            .iter()
            .map(|t| t.parse::<LogType>().map_err(LogError::InvalidFilter))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { min_level, types })
    }
}
