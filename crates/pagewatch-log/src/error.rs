//! Log errors.

use thiserror::Error;

/// Errors raised by the log writer, reader and watcher.
///
/// Malformed records found while reading are not errors; they are counted by
/// the scanner instead.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Log writer closed")]
    Closed,
}

impl From<notify::Error> for LogError {
    fn from(e: notify::Error) -> Self {
        LogError::Watcher(e.to_string())
    }
}
