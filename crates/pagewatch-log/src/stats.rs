//! Statistics derived from a set of entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entry::{LogEntry, LogLevel, LogType};

/// Severity at or above which a performance entry counts as slow.
pub const SLOW_PERFORMANCE_SEVERITY: u8 = 3;

/// Earliest and latest entry timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSpan {
    pub start: String,
    pub end: String,
    pub duration_ms: i64,
}

/// Counts folded over the current entry set. Never stored; recompute freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub total: usize,
    pub by_type: BTreeMap<LogType, usize>,
    pub by_level: BTreeMap<LogLevel, usize>,
    pub errors: usize,
    pub warnings: usize,
    pub slow_performance: usize,
    pub failed_requests: usize,
    pub time_span: Option<TimeSpan>,
}

impl LogStats {
    pub fn compute<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        let mut stats = Self::default();
        let mut span: Option<(DateTime<Utc>, DateTime<Utc>, &str, &str)> = None;

        for entry in entries {
            stats.total += 1;
            *stats.by_type.entry(entry.entry_type()).or_default() += 1;
            *stats.by_level.entry(entry.level()).or_default() += 1;

            if entry.is_error() {
                stats.errors += 1;
            } else if entry.level() == LogLevel::Warn {
                stats.warnings += 1;
            }
            if entry.entry_type() == LogType::Performance
                && entry.severity >= SLOW_PERFORMANCE_SEVERITY
            {
                stats.slow_performance += 1;
            }
            if entry.entry_type() == LogType::Network
                && entry.raw.status_code().is_some_and(|s| s >= 400)
            {
                stats.failed_requests += 1;
            }

            let Ok(at) = DateTime::parse_from_rfc3339(entry.timestamp()) else {
                continue;
            };
            let at = at.with_timezone(&Utc);
            let ts = entry.timestamp();
            span = Some(match span {
                None => (at, at, ts, ts),
                Some((min, max, min_ts, max_ts)) => {
                    let (min, min_ts) = if at < min { (at, ts) } else { (min, min_ts) };
                    let (max, max_ts) = if at > max { (at, ts) } else { (max, max_ts) };
                    (min, max, min_ts, max_ts)
                }
            });
        }

        stats.time_span = span.map(|(min, max, min_ts, max_ts)| TimeSpan {
            start: min_ts.to_string(),
            end: max_ts.to_string(),
            duration_ms: (max - min).num_milliseconds(),
        });
        stats
    }
}
