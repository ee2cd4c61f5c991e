//! Severity and enrichment.
//!
//! Every function here is a pure function of the raw entry fields, so
//! re-enriching a persisted record always reproduces the same values.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::correlation::ScreenshotIndex;
use crate::entry::{LogEntry, LogLevel, LogType, RawEntry};

/// Maximum summary length in characters.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Enrich a candidate into an immutable entry.
pub fn enrich(raw: RawEntry, screenshots: &ScreenshotIndex) -> LogEntry {
    LogEntry {
        id: entry_id(&raw),
        severity: severity(&raw),
        category: category(&raw),
        summary: summary(&raw),
        has_screenshot: screenshots.matches(&raw.timestamp),
        raw,
    }
}

/// Severity from 1 to 5; the highest applicable rule wins.
pub fn severity(raw: &RawEntry) -> u8 {
    if is_uncaught(raw) {
        return 5;
    }
    let by_level = match raw.level {
        LogLevel::Error => 4,
        LogLevel::Warn => 3,
        LogLevel::Info => 2,
        LogLevel::Debug => 1,
    };
    let by_status = match raw.status_code() {
        Some(500..) => 4,
        Some(400..=499) => 3,
        _ => 1,
    };
    by_level.max(by_status)
}

/// Whether the payload marks an uncaught or unhandled error.
pub fn is_uncaught(raw: &RawEntry) -> bool {
    if raw.data.get("uncaught").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    ["message", "text", "errorText"]
        .iter()
        .filter_map(|key| raw.data.get(*key).and_then(Value::as_str))
        .any(|text| {
            let text = text.to_ascii_lowercase();
            text.contains("uncaught") || text.contains("unhandled")
        })
}

/// Category, finer grained than the entry type.
pub fn category(raw: &RawEntry) -> String {
    let category = match raw.entry_type {
        LogType::Network => match raw.status_code() {
            Some(500..) => "server_error",
            Some(400..=499) => "client_error",
            Some(300..=399) => "redirect",
            Some(_) => "network_success",
            None if raw.level == LogLevel::Error => "network_failure",
            None => "network_request",
        },
        LogType::Error => error_category(raw),
        LogType::Runtime if raw.level == LogLevel::Error => error_category(raw),
        LogType::Console => return format!("console_{}", raw.level),
        LogType::Performance if raw.level >= LogLevel::Warn => "performance_issue",
        LogType::Performance => "performance_metric",
        LogType::Page => "page_lifecycle",
        LogType::Security if raw.level >= LogLevel::Warn => "security_issue",
        LogType::Security => "security",
        LogType::Runtime => "runtime",
    };
    category.to_string()
}

fn error_category(raw: &RawEntry) -> &'static str {
    let mut haystack = String::new();
    if let Some(message) = raw.message() {
        haystack.push_str(message);
    }
    if let Some(stack) = raw.context.as_ref().and_then(|c| c.stack_trace.as_deref()) {
        haystack.push('\n');
        haystack.push_str(stack);
    }
    if haystack.contains("TypeError") {
        "type_error"
    } else if haystack.contains("ReferenceError") {
        "reference_error"
    } else if haystack.contains("SyntaxError") {
        "syntax_error"
    } else {
        "runtime_error"
    }
}

/// One-line human readable rendering.
pub fn summary(raw: &RawEntry) -> String {
    let line = match raw.entry_type {
        LogType::Network => network_summary(raw),
        _ => {
            let message = raw
                .message()
                .map(str::to_string)
                .or_else(|| {
                    ["event", "metric", "securityState"]
                        .iter()
                        .find_map(|key| raw.data.get(*key).and_then(Value::as_str))
                        .map(str::to_string)
                })
                .unwrap_or_else(|| raw.source.clone());
            format!("[{}] {}: {}", raw.level, raw.entry_type, message)
        }
    };
    truncate(first_line(&line), SUMMARY_MAX_CHARS)
}

fn network_summary(raw: &RawEntry) -> String {
    let context = raw.context.as_ref();
    let method = raw
        .data
        .get("method")
        .and_then(Value::as_str)
        .or_else(|| context.and_then(|c| c.method.as_deref()))
        .unwrap_or("GET");
    let url = raw
        .data
        .get("url")
        .and_then(Value::as_str)
        .or_else(|| context.and_then(|c| c.url.as_deref()));

    let outcome = match raw.status_code() {
        Some(status) => status.to_string(),
        None => raw
            .data
            .get("errorText")
            .and_then(Value::as_str)
            .or_else(|| raw.data.get("phase").and_then(Value::as_str))
            .unwrap_or("pending")
            .to_string(),
    };
    match url {
        Some(url) => format!("{} {} -> {}", method, url, outcome),
        None => format!("[{}] network: {}", raw.level, raw.message().unwrap_or(outcome.as_str())),
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Fingerprint of the timestamp and the payload.
///
/// `serde_json` maps keep keys ordered, so equal payloads serialize to equal
/// bytes regardless of the order they were built in.
pub fn entry_id(raw: &RawEntry) -> String {
    let mut hasher = Sha256::new();
    for part in [
        raw.timestamp.as_str(),
        raw.entry_type.as_str(),
        raw.level.as_str(),
        raw.source.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hasher.update(raw.data.to_string().as_bytes());
    hasher.update(b"|");
    if let Some(context) = &raw.context {
        hasher.update(serde_json::to_string(context).unwrap_or_default().as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
