//! # pagewatch Log
//!
//! The structured session log.
//!
//! ## Components
//!
//! - [`EventNormalizer`] - maps protocol events to candidate entries
//! - [`enrich`] - severity, category, summary and id for a candidate
//! - [`LogWriter`] - append-only writer with a session metadata header
//! - [`LogScanner`] / [`LogTail`] / [`LogStore`] - incremental reader
//! - [`LogWatcher`] - rescans on file change and broadcasts new entries
//! - [`LogStats`] and [`query`] - derived views
//!
//! ## File format
//!
//! ```text
//! # pagewatch session log
//!
//! { ...session metadata... }
//! ---
//! { ...entry... }
//! ---
//! ```

mod correlation;
mod enrich;
mod entry;
mod error;
mod filter;
mod normalizer;
mod reader;
mod scanner;
mod stats;
mod watcher;
mod writer;

pub mod query;

pub use correlation::{
    CORRELATION_KEY_LEN, ScreenshotIndex, correlation_key, key_from_file_name,
    screenshot_file_name,
};
pub use enrich::{category, enrich, entry_id, is_uncaught, severity, summary};
pub use entry::{
    EntryRejection, LogContext, LogEntry, LogLevel, LogType, RawEntry, SCHEMA_VERSION, SchemaInfo,
    SessionMetadata,
};
pub use error::LogError;
pub use filter::LogFilter;
pub use normalizer::{EventNormalizer, NormalizerStats};
pub use query::LogQuery;
pub use reader::{LogStore, LogTail, load};
pub use scanner::{LogScanner, ParsedLog};
pub use stats::{LogStats, TimeSpan};
pub use watcher::LogWatcher;
pub use writer::{LOG_HEADER, LogWriter, RECORD_SEPARATOR};
