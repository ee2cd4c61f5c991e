//! Screenshot naming and the approximate screenshot-to-entry correlation.
//!
//! A screenshot is linked to an entry when the timestamp stamp embedded in
//! its file name shares the entry's timestamp down to the second. This is a
//! heuristic: two entries in the same second both report `hasScreenshot`,
//! and there is no explicit entry-to-screenshot id.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

/// Length of the timestamp prefix compared for correlation
/// (`YYYY-MM-DDTHH:MM:SS`).
pub const CORRELATION_KEY_LEN: usize = 19;

const PREFIX: &str = "screenshot-";
const EXTENSION: &str = ".png";

/// Correlation key of an ISO-8601 timestamp.
pub fn correlation_key(timestamp: &str) -> String {
    let prefix: String = timestamp.chars().take(CORRELATION_KEY_LEN).collect();
    file_stamp(&prefix)
}

/// File-name-safe stamp of a full timestamp.
pub fn file_stamp(timestamp: &str) -> String {
    timestamp.replace([':', '.'], "-")
}

/// `screenshot-<stamp>-<context>.png`
pub fn screenshot_file_name(timestamp: &str, context: &str) -> String {
    let context = sanitize_context(context);
    if context.is_empty() {
        format!("{}{}{}", PREFIX, file_stamp(timestamp), EXTENSION)
    } else {
        format!("{}{}-{}{}", PREFIX, file_stamp(timestamp), context, EXTENSION)
    }
}

/// Correlation key recovered from a screenshot file name.
pub fn key_from_file_name(name: &str) -> Option<String> {
    let rest = name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    let key: String = rest.chars().take(CORRELATION_KEY_LEN).collect();
    (key.len() == CORRELATION_KEY_LEN).then_some(key)
}

fn sanitize_context(context: &str) -> String {
    let cleaned: String = context
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(48)
        .collect();
    cleaned.trim_matches('_').to_string()
}

/// Set of correlation keys of screenshots on disk.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotIndex {
    keys: HashSet<String>,
}

impl ScreenshotIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every screenshot in `dir`. A missing directory yields an empty index.
    pub fn from_dir(dir: &Path) -> Self {
        let mut index = Self::new();
        let Ok(read_dir) = std::fs::read_dir(dir) else {
            debug!("Screenshot directory {} not readable", dir.display());
            return index;
        };
        for entry in read_dir.flatten() {
            if let Some(key) = entry.file_name().to_str().and_then(key_from_file_name) {
                index.keys.insert(key);
            }
        }
        index
    }

    pub fn insert_file_name(&mut self, name: &str) {
        if let Some(key) = key_from_file_name(name) {
            self.keys.insert(key);
        }
    }

    /// Whether a screenshot was taken in the same second as `timestamp`.
    pub fn matches(&self, timestamp: &str) -> bool {
        self.keys.contains(&correlation_key(timestamp))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
