//! Monitor errors.

use pagewatch_log::LogError;
use thiserror::Error;

/// Monitor error types.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The session log could not be created or written.
    #[error("Session log error: {0}")]
    Log(#[from] LogError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The consumer task ended abnormally.
    #[error("Pipeline task failed: {0}")]
    Task(String),
}
