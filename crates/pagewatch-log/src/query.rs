//! Read-only views over entries.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::entry::{LogEntry, LogLevel, LogType};

/// Entries whose level is `error` or whose type is `error`.
pub fn errors_only(entries: &[LogEntry]) -> Vec<&LogEntry> {
    entries.iter().filter(|e| e.is_error()).collect()
}

pub fn performance_only(entries: &[LogEntry]) -> Vec<&LogEntry> {
    entries
        .iter()
        .filter(|e| e.entry_type() == LogType::Performance)
        .collect()
}

/// Entries at or after `since`.
pub fn since<'a>(entries: &'a [LogEntry], since: &str) -> Vec<&'a LogEntry> {
    let bound = parse(since);
    entries
        .iter()
        .filter(|e| match (bound, parse(e.timestamp())) {
            (Some(bound), Some(at)) => at >= bound,
            _ => e.timestamp() >= since,
        })
        .collect()
}

pub fn find_by_id<'a>(entries: &'a [LogEntry], id: &str) -> Option<&'a LogEntry> {
    entries.iter().find(|e| e.id == id)
}

fn parse(ts: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(ts).ok()
}

/// Combinable filter, deserializable from a URL query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    #[serde(rename = "type")]
    pub entry_type: Option<LogType>,
    /// Lowest level to include.
    pub level: Option<LogLevel>,
    pub min_severity: Option<u8>,
    pub category: Option<String>,
    pub since: Option<String>,
    /// Keep only the last `limit` matches.
    pub limit: Option<usize>,
}

impl LogQuery {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.entry_type.is_none_or(|t| entry.entry_type() == t)
            && self.level.is_none_or(|l| entry.level() >= l)
            && self.min_severity.is_none_or(|s| entry.severity >= s)
            && self
                .category
                .as_deref()
                .is_none_or(|c| entry.category == c)
    }

    pub fn apply<'a>(&self, entries: &'a [LogEntry]) -> Vec<&'a LogEntry> {
        let candidates = match &self.since {
            Some(bound) => since(entries, bound),
            None => entries.iter().collect(),
        };
        let mut matched: Vec<&LogEntry> = candidates
            .into_iter()
            .filter(|e| self.matches(e))
            .collect();
        if let Some(limit) = self.limit {
            let skip = matched.len().saturating_sub(limit);
            matched.drain(..skip);
        }
        matched
    }
}
