//! Log entry data model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::LogFilter;

/// Schema version written into every session header.
pub const SCHEMA_VERSION: &str = "1.0";

/// Coarse entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Console,
    Network,
    Error,
    Performance,
    Page,
    Security,
    Runtime,
}

impl LogType {
    pub const ALL: [LogType; 7] = [
        LogType::Console,
        LogType::Network,
        LogType::Error,
        LogType::Performance,
        LogType::Page,
        LogType::Security,
        LogType::Runtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Console => "console",
            LogType::Network => "network",
            LogType::Error => "error",
            LogType::Performance => "performance",
            LogType::Page => "page",
            LogType::Security => "security",
            LogType::Runtime => "runtime",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entry type '{}'", s))
    }
}

/// Entry level, ordered from least to most important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [LogLevel; 4] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| format!("unknown level '{}'", s))
    }
}

/// Optional request/stack context attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl LogContext {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.method.is_none()
            && self.status_code.is_none()
            && self.stack_trace.is_none()
    }
}

/// Why a record was rejected as a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRejection {
    MissingField(&'static str),
    InvalidField { field: &'static str, reason: String },
}

impl fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRejection::MissingField(field) => write!(f, "missing field '{}'", field),
            EntryRejection::InvalidField { field, reason } => {
                write!(f, "invalid field '{}': {}", field, reason)
            }
        }
    }
}

/// A normalized but not yet enriched entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: LogType,
    pub level: LogLevel,
    pub source: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LogContext>,
}

impl RawEntry {
    /// Check the required-field invariant.
    pub fn validate(&self) -> Result<(), EntryRejection> {
        if self.timestamp.trim().is_empty() {
            return Err(EntryRejection::MissingField("timestamp"));
        }
        if self.source.trim().is_empty() {
            return Err(EntryRejection::MissingField("source"));
        }
        Ok(())
    }

    /// Build an entry from an arbitrary decoded JSON record.
    ///
    /// Enrichment fields present in the record are ignored; they are always
    /// recomputed from the raw fields.
    pub fn from_value(value: &Value) -> Result<Self, EntryRejection> {
        let obj = value
            .as_object()
            .ok_or_else(|| EntryRejection::InvalidField {
                field: "record",
                reason: "not a JSON object".to_string(),
            })?;

        let required = |field: &'static str| -> Result<&str, EntryRejection> {
            match obj.get(field).and_then(Value::as_str) {
                Some(s) if !s.trim().is_empty() => Ok(s),
                _ => Err(EntryRejection::MissingField(field)),
            }
        };

        let timestamp = required("timestamp")?;
        let entry_type = required("type")?;
        let level = required("level")?;
        let source = required("source")?;

        let entry_type = entry_type
            .parse::<LogType>()
            .map_err(|reason| EntryRejection::InvalidField {
                field: "type",
                reason,
            })?;
        let level = level
            .parse::<LogLevel>()
            .map_err(|reason| EntryRejection::InvalidField {
                field: "level",
                reason,
            })?;

        let context = match obj.get("context") {
            None | Some(Value::Null) => None,
            Some(ctx) => Some(serde_json::from_value::<LogContext>(ctx.clone()).map_err(
                |e| EntryRejection::InvalidField {
                    field: "context",
                    reason: e.to_string(),
                },
            )?),
        };

        Ok(Self {
            timestamp: timestamp.to_string(),
            entry_type,
            level,
            source: source.to_string(),
            data: obj.get("data").cloned().unwrap_or(Value::Null),
            context,
        })
    }

    /// First human-readable message carried by the payload, if any.
    pub fn message(&self) -> Option<&str> {
        ["message", "text", "errorText"]
            .iter()
            .find_map(|key| self.data.get(*key).and_then(Value::as_str))
    }

    /// HTTP status carried by the payload or the context.
    pub fn status_code(&self) -> Option<u16> {
        ["status", "statusCode"]
            .iter()
            .find_map(|key| self.data.get(*key).and_then(Value::as_u64))
            .and_then(|s| u16::try_from(s).ok())
            .or_else(|| self.context.as_ref().and_then(|c| c.status_code))
    }
}

/// A fully enriched, immutable log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(flatten)]
    pub raw: RawEntry,
    /// Fingerprint of timestamp and payload, stable across re-parses.
    pub id: String,
    /// 1 (lowest) to 5 (critical).
    pub severity: u8,
    pub category: String,
    pub summary: String,
    /// Best-effort: a screenshot whose file name stamp falls in the same second.
    #[serde(rename = "hasScreenshot")]
    pub has_screenshot: bool,
}

impl LogEntry {
    pub fn timestamp(&self) -> &str {
        &self.raw.timestamp
    }

    pub fn entry_type(&self) -> LogType {
        self.raw.entry_type
    }

    pub fn level(&self) -> LogLevel {
        self.raw.level
    }

    pub fn is_error(&self) -> bool {
        self.raw.level == LogLevel::Error || self.raw.entry_type == LogType::Error
    }
}

/// Description of the log schema recorded in the session header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub version: String,
    pub description: String,
    pub types: Vec<LogType>,
    pub levels: Vec<LogLevel>,
}

impl Default for SchemaInfo {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            description: "Browser session events normalized to one JSON object per record"
                .to_string(),
            types: LogType::ALL.to_vec(),
            levels: LogLevel::ALL.to_vec(),
        }
    }
}

/// First record of every log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub session_start: String,
    pub schema: SchemaInfo,
    pub filters: LogFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

impl SessionMetadata {
    pub fn new(session_start: impl Into<String>, filters: LogFilter) -> Self {
        Self {
            session_start: session_start.into(),
            schema: SchemaInfo::default(),
            filters,
            target_url: None,
        }
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    /// Whether a decoded record looks like a session header.
    pub fn matches(value: &Value) -> bool {
        value.get("sessionStart").is_some_and(Value::is_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_type_round_trip_names() {
        for t in LogType::ALL {
            assert_eq!(t.as_str().parse::<LogType>().unwrap(), t);
        }
        assert!("dom".parse::<LogType>().is_err());
    }

    #[test]
    fn test_from_value_valid() {
        let value = json!({
            "timestamp": "2024-05-01T10:20:30.123Z",
            "type": "network",
            "level": "info",
            "source": "network",
            "data": {"status": 200},
            "context": {"url": "https://example.com", "statusCode": 200}
        });
        let raw = RawEntry::from_value(&value).unwrap();
        assert_eq!(raw.entry_type, LogType::Network);
        assert_eq!(raw.status_code(), Some(200));
        assert_eq!(
            raw.context.unwrap().url.as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_from_value_missing_required_fields() {
        for field in ["timestamp", "type", "level", "source"] {
            let mut value = json!({
                "timestamp": "2024-05-01T10:20:30.123Z",
                "type": "console",
                "level": "info",
                "source": "console"
            });
            value.as_object_mut().unwrap().remove(field);
            assert_eq!(
                RawEntry::from_value(&value),
                Err(EntryRejection::MissingField(field))
            );
        }
    }

    #[test]
    fn test_from_value_empty_source() {
        let value = json!({
            "timestamp": "2024-05-01T10:20:30.123Z",
            "type": "console",
            "level": "info",
            "source": "  "
        });
        assert_eq!(
            RawEntry::from_value(&value),
            Err(EntryRejection::MissingField("source"))
        );
    }

    #[test]
    fn test_from_value_unknown_level() {
        let value = json!({
            "timestamp": "2024-05-01T10:20:30.123Z",
            "type": "console",
            "level": "fatal",
            "source": "console"
        });
        assert!(matches!(
            RawEntry::from_value(&value),
            Err(EntryRejection::InvalidField { field: "level", .. })
        ));
    }

    #[test]
    fn test_status_from_context() {
        let raw = RawEntry {
            timestamp: "t".to_string(),
            entry_type: LogType::Network,
            level: LogLevel::Info,
            source: "network".to_string(),
            data: json!({}),
            context: Some(LogContext {
                status_code: Some(404),
                ..Default::default()
            }),
        };
        assert_eq!(raw.status_code(), Some(404));
    }

    #[test]
    fn test_metadata_matches() {
        assert!(SessionMetadata::matches(&json!({"sessionStart": "2024"})));
        assert!(!SessionMetadata::matches(&json!({"timestamp": "2024"})));
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = LogEntry {
            raw: RawEntry {
                timestamp: "2024-05-01T10:20:30.123Z".to_string(),
                entry_type: LogType::Console,
                level: LogLevel::Warn,
                source: "app.js:3:1".to_string(),
                data: json!({"message": "careful"}),
                context: None,
            },
            id: "abc".to_string(),
            severity: 3,
            category: "console_warn".to_string(),
            summary: "[warn] console: careful".to_string(),
            has_screenshot: false,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "console");
        assert_eq!(value["hasScreenshot"], false);
        assert!(value.get("raw").is_none());
        assert!(value.get("context").is_none());
    }
}
