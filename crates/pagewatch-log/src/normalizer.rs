//! Event normalizer: raw protocol events to candidate log entries.
//!
//! Every domain the protocol session enables has a case here. Events that
//! cannot be mapped are dropped and counted; nothing in this module returns
//! an error.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::entry::{LogContext, LogLevel, LogType, RawEntry};
use crate::filter::LogFilter;

/// Layout shift score above which a shift is reported as a warning.
pub const LAYOUT_SHIFT_THRESHOLD: f64 = 0.1;

/// Requests remembered for correlation before the oldest half is dropped.
pub const MAX_TRACKED_REQUESTS: usize = 4096;

/// Counters for events that did and did not become entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizerStats {
    pub normalized: u64,
    pub filtered: u64,
    pub unmapped: u64,
    pub malformed: u64,
    pub ignored: u64,
}

impl NormalizerStats {
    pub fn total(&self) -> u64 {
        self.normalized + self.filtered + self.unmapped + self.malformed + self.ignored
    }
}

/// Result of mapping one event, before timestamping and filtering.
enum Mapping {
    Entry(Candidate),
    /// Domain enabled for control purposes only.
    Ignored,
    Unmapped,
    Malformed(&'static str),
}

struct Candidate {
    entry_type: LogType,
    level: LogLevel,
    source: String,
    data: Value,
    context: Option<LogContext>,
}

impl Candidate {
    fn new(entry_type: LogType, level: LogLevel, source: impl Into<String>, data: Value) -> Self {
        Self {
            entry_type,
            level,
            source: source.into(),
            data,
            context: None,
        }
    }

    fn with_context(mut self, context: LogContext) -> Self {
        if !context.is_empty() {
            self.context = Some(context);
        }
        self
    }
}

#[derive(Debug, Clone)]
struct RequestInfo {
    method: String,
    url: String,
    loader_id: Option<String>,
    seq: u64,
}

/// Maps `(method, params)` pairs to [`RawEntry`] candidates.
///
/// Stateful: it remembers request method/url by request id so response and
/// failure events can carry them, and it keeps timestamps non-decreasing.
#[derive(Debug)]
pub struct EventNormalizer {
    filter: LogFilter,
    requests: HashMap<String, RequestInfo>,
    request_seq: u64,
    last_timestamp: Option<DateTime<Utc>>,
    stats: NormalizerStats,
}

impl Default for EventNormalizer {
    fn default() -> Self {
        Self::new(LogFilter::default())
    }
}

impl EventNormalizer {
    pub fn new(filter: LogFilter) -> Self {
        Self {
            filter,
            requests: HashMap::new(),
            request_seq: 0,
            last_timestamp: None,
            stats: NormalizerStats::default(),
        }
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    pub fn stats(&self) -> NormalizerStats {
        self.stats
    }

    /// Requests seen but not yet finished or failed.
    pub fn tracked_requests(&self) -> usize {
        self.requests.len()
    }

    /// Normalize one event stamped with the current wall clock.
    pub fn normalize(&mut self, method: &str, params: &Value) -> Option<RawEntry> {
        self.normalize_at(method, params, Utc::now())
    }

    /// Normalize one event observed at `now`.
    pub fn normalize_at(
        &mut self,
        method: &str,
        params: &Value,
        now: DateTime<Utc>,
    ) -> Option<RawEntry> {
        let candidate = match self.map(method, params) {
            Mapping::Entry(candidate) => candidate,
            Mapping::Ignored => {
                self.stats.ignored += 1;
                return None;
            }
            Mapping::Unmapped => {
                trace!("No mapping for {}", method);
                self.stats.unmapped += 1;
                return None;
            }
            Mapping::Malformed(reason) => {
                trace!("Malformed {} event: {}", method, reason);
                self.stats.malformed += 1;
                return None;
            }
        };

        let entry = RawEntry {
            timestamp: self.stamp(now),
            entry_type: candidate.entry_type,
            level: candidate.level,
            source: candidate.source,
            data: candidate.data,
            context: candidate.context,
        };
        if let Err(rejection) = entry.validate() {
            trace!("Suppressed {} entry: {}", method, rejection);
            self.stats.malformed += 1;
            return None;
        }
        if !self.filter.allows(&entry) {
            self.stats.filtered += 1;
            return None;
        }

        self.stats.normalized += 1;
        Some(entry)
    }

    fn stamp(&mut self, now: DateTime<Utc>) -> String {
        let ts = match self.last_timestamp {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn map(&mut self, method: &str, params: &Value) -> Mapping {
        let Some((domain, _)) = method.split_once('.') else {
            return Mapping::Unmapped;
        };
        if matches!(domain, "DOM" | "CSS") {
            return Mapping::Ignored;
        }
        if !params.is_object() {
            return Mapping::Malformed("params is not an object");
        }

        match method {
            "Runtime.consoleAPICalled" => console_api_called(params),
            "Runtime.exceptionThrown" => exception_thrown(params),
            "Log.entryAdded" => log_entry_added(params),
            "Network.requestWillBeSent" => self.request_will_be_sent(params),
            "Network.responseReceived" => self.response_received(params),
            "Network.loadingFailed" => self.loading_failed(params),
            "Network.loadingFinished" => self.loading_finished(params),
            "Performance.metrics" => performance_metrics(params),
            "PerformanceTimeline.timelineEventAdded" => timeline_event(params),
            "Page.loadEventFired" => page_event("load", params),
            "Page.domContentEventFired" => page_event("DOMContentLoaded", params),
            "Page.frameNavigated" => self.navigated(params),
            "Page.javascriptDialogOpening" => dialog_opening(params),
            "Security.securityStateChanged" => security_state(params),
            "Security.visibleSecurityStateChanged" => match params.get("visibleSecurityState") {
                Some(state) => security_state(state),
                None => Mapping::Malformed("missing visibleSecurityState"),
            },
            "Security.certificateError" => certificate_error(params),
            _ => Mapping::Unmapped,
        }
    }

    // ------------------------------------------------------------------------
    // Network
    // ------------------------------------------------------------------------

    fn request_will_be_sent(&mut self, params: &Value) -> Mapping {
        let Some(request_id) = str_field(params, "requestId") else {
            return Mapping::Malformed("missing requestId");
        };
        let Some(request) = params.get("request") else {
            return Mapping::Malformed("missing request");
        };
        let Some(url) = str_field(request, "url") else {
            return Mapping::Malformed("missing request.url");
        };
        let method = str_field(request, "method").unwrap_or("GET");

        self.remember_request(
            request_id,
            method,
            url,
            str_field(params, "loaderId").map(str::to_string),
        );

        let data = json!({
            "requestId": request_id,
            "phase": "request",
            "method": method,
            "url": url,
            "resourceType": params.get("type").cloned().unwrap_or(Value::Null),
        });
        Mapping::Entry(
            Candidate::new(LogType::Network, LogLevel::Debug, "network", data).with_context(
                LogContext {
                    url: Some(url.to_string()),
                    method: Some(method.to_string()),
                    ..Default::default()
                },
            ),
        )
    }

    fn remember_request(
        &mut self,
        request_id: &str,
        method: &str,
        url: &str,
        loader_id: Option<String>,
    ) {
        if self.requests.len() >= MAX_TRACKED_REQUESTS {
            let mut seqs: Vec<u64> = self.requests.values().map(|r| r.seq).collect();
            seqs.sort_unstable();
            let cutoff = seqs[seqs.len() / 2];
            self.requests.retain(|_, r| r.seq >= cutoff);
            debug!(
                "Dropped stale request correlations, {} still tracked",
                self.requests.len()
            );
        }
        self.request_seq += 1;
        self.requests.insert(
            request_id.to_string(),
            RequestInfo {
                method: method.to_string(),
                url: url.to_string(),
                loader_id,
                seq: self.request_seq,
            },
        );
    }

    /// A main-frame navigation ends every request except the new document's.
    fn navigated(&mut self, params: &Value) -> Mapping {
        let mapping = frame_navigated(params);
        if let (Mapping::Entry(_), Some(frame)) = (&mapping, params.get("frame")) {
            if frame.get("parentId").is_none() {
                let loader_id = str_field(frame, "loaderId");
                self.requests
                    .retain(|_, r| loader_id.is_some() && r.loader_id.as_deref() == loader_id);
            }
        }
        mapping
    }

    fn response_received(&mut self, params: &Value) -> Mapping {
        let Some(request_id) = str_field(params, "requestId") else {
            return Mapping::Malformed("missing requestId");
        };
        let Some(response) = params.get("response") else {
            return Mapping::Malformed("missing response");
        };
        let Some(status) = response.get("status").and_then(Value::as_f64) else {
            return Mapping::Malformed("missing response.status");
        };
        let status = status as u16;
        let known = self.requests.get(request_id).cloned();
        let url = str_field(response, "url")
            .map(str::to_string)
            .or_else(|| known.as_ref().map(|r| r.url.clone()))
            .unwrap_or_default();
        let method = known.map(|r| r.method);

        let level = match status {
            500.. => LogLevel::Error,
            400..=499 => LogLevel::Warn,
            _ => LogLevel::Info,
        };
        let data = json!({
            "requestId": request_id,
            "phase": "response",
            "method": method,
            "url": url,
            "status": status,
            "statusText": response.get("statusText").cloned().unwrap_or(Value::Null),
            "mimeType": response.get("mimeType").cloned().unwrap_or(Value::Null),
            "resourceType": params.get("type").cloned().unwrap_or(Value::Null),
        });
        Mapping::Entry(
            Candidate::new(LogType::Network, level, "network", data).with_context(LogContext {
                url: Some(url),
                method,
                status_code: Some(status),
                ..Default::default()
            }),
        )
    }

    fn loading_failed(&mut self, params: &Value) -> Mapping {
        let Some(request_id) = str_field(params, "requestId") else {
            return Mapping::Malformed("missing requestId");
        };
        let known = self.requests.remove(request_id);
        let error_text = str_field(params, "errorText").unwrap_or("unknown error");
        let canceled = params
            .get("canceled")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let level = if canceled {
            LogLevel::Debug
        } else {
            LogLevel::Error
        };
        let data = json!({
            "requestId": request_id,
            "phase": "failed",
            "method": known.as_ref().map(|r| r.method.as_str()),
            "url": known.as_ref().map(|r| r.url.as_str()),
            "errorText": error_text,
            "canceled": canceled,
        });
        let context = LogContext {
            url: known.as_ref().map(|r| r.url.clone()),
            method: known.map(|r| r.method),
            ..Default::default()
        };
        Mapping::Entry(Candidate::new(LogType::Network, level, "network", data).with_context(context))
    }

    fn loading_finished(&mut self, params: &Value) -> Mapping {
        let Some(request_id) = str_field(params, "requestId") else {
            return Mapping::Malformed("missing requestId");
        };
        let known = self.requests.remove(request_id);
        let data = json!({
            "requestId": request_id,
            "phase": "finished",
            "method": known.as_ref().map(|r| r.method.as_str()),
            "url": known.as_ref().map(|r| r.url.as_str()),
            "encodedDataLength": params.get("encodedDataLength").cloned().unwrap_or(Value::Null),
        });
        let context = LogContext {
            url: known.as_ref().map(|r| r.url.clone()),
            method: known.map(|r| r.method),
            ..Default::default()
        };
        Mapping::Entry(
            Candidate::new(LogType::Network, LogLevel::Debug, "network", data).with_context(context),
        )
    }
}

// ============================================================================
// Runtime / Log
// ============================================================================

fn console_api_called(params: &Value) -> Mapping {
    let Some(console_type) = str_field(params, "type") else {
        return Mapping::Malformed("missing type");
    };
    let args: Vec<String> = params
        .get("args")
        .and_then(Value::as_array)
        .map(|args| args.iter().map(render_remote_object).collect())
        .unwrap_or_default();
    let message = args.join(" ");

    let (entry_type, level) = match console_type {
        "error" | "assert" => (LogType::Console, LogLevel::Error),
        "warning" => (LogType::Console, LogLevel::Warn),
        "debug" | "trace" => (LogType::Console, LogLevel::Debug),
        "timeStamp" | "timeEnd" | "profile" | "profileEnd" => {
            (LogType::Performance, LogLevel::Info)
        }
        _ => (LogType::Console, LogLevel::Info),
    };

    let frames = call_frames(params.get("stackTrace"));
    let source = frames
        .first()
        .map(|f| f.location())
        .unwrap_or_else(|| "console".to_string());
    let data = json!({
        "message": message,
        "consoleType": console_type,
        "args": args,
    });
    let context = LogContext {
        url: frames.first().map(|f| f.url.clone()),
        stack_trace: render_stack(&frames),
        ..Default::default()
    };
    Mapping::Entry(Candidate::new(entry_type, level, source, data).with_context(context))
}

fn exception_thrown(params: &Value) -> Mapping {
    let Some(details) = params.get("exceptionDetails") else {
        return Mapping::Malformed("missing exceptionDetails");
    };
    let Some(text) = str_field(details, "text") else {
        return Mapping::Malformed("missing exceptionDetails.text");
    };
    let line = details.get("lineNumber").and_then(Value::as_i64).unwrap_or(0);
    let column = details
        .get("columnNumber")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let description = details
        .get("exception")
        .and_then(|e| str_field(e, "description"));
    let message = description
        .and_then(|d| d.lines().next())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(text);

    let frames = call_frames(details.get("stackTrace"));
    let source = match str_field(details, "url") {
        Some(url) => format!("{}:{}:{}", url, line + 1, column + 1),
        None => frames
            .first()
            .map(|f| f.location())
            .unwrap_or_else(|| "runtime".to_string()),
    };
    let stack_trace = render_stack(&frames)
        .or_else(|| description.filter(|d| d.contains('\n')).map(str::to_string));

    let data = json!({
        "message": message,
        "text": text,
        "uncaught": true,
        "lineNumber": line,
        "columnNumber": column,
    });
    let context = LogContext {
        url: str_field(details, "url").map(str::to_string),
        stack_trace,
        ..Default::default()
    };
    Mapping::Entry(Candidate::new(LogType::Error, LogLevel::Error, source, data).with_context(context))
}

fn log_entry_added(params: &Value) -> Mapping {
    let Some(entry) = params.get("entry") else {
        return Mapping::Malformed("missing entry");
    };
    let Some(text) = str_field(entry, "text") else {
        return Mapping::Malformed("missing entry.text");
    };
    let log_source = str_field(entry, "source").unwrap_or("other");

    let entry_type = match log_source {
        "network" => LogType::Network,
        "security" => LogType::Security,
        "violation" | "intervention" | "deprecation" | "recommendation" | "javascript" => {
            LogType::Runtime
        }
        _ => LogType::Console,
    };
    let level = match str_field(entry, "level") {
        Some("verbose") => LogLevel::Debug,
        Some("warning") => LogLevel::Warn,
        Some("error") => LogLevel::Error,
        _ => LogLevel::Info,
    };

    let url = str_field(entry, "url");
    let source = match url {
        Some(url) => match entry.get("lineNumber").and_then(Value::as_i64) {
            Some(line) => format!("{}:{}", url, line + 1),
            None => url.to_string(),
        },
        None => format!("log:{}", log_source),
    };
    let data = json!({
        "message": text,
        "logSource": log_source,
    });
    let context = LogContext {
        url: url.map(str::to_string),
        stack_trace: render_stack(&call_frames(entry.get("stackTrace"))),
        ..Default::default()
    };
    Mapping::Entry(Candidate::new(entry_type, level, source, data).with_context(context))
}

// ============================================================================
// Performance
// ============================================================================

fn performance_metrics(params: &Value) -> Mapping {
    let Some(metrics) = params.get("metrics").and_then(Value::as_array) else {
        return Mapping::Malformed("missing metrics");
    };
    let metrics: Map<String, Value> = metrics
        .iter()
        .filter_map(|m| Some((str_field(m, "name")?.to_string(), m.get("value")?.clone())))
        .collect();
    let data = json!({
        "metric": "metrics",
        "title": params.get("title").cloned().unwrap_or(Value::Null),
        "metrics": metrics,
    });
    Mapping::Entry(Candidate::new(
        LogType::Performance,
        LogLevel::Info,
        "performance",
        data,
    ))
}

fn timeline_event(params: &Value) -> Mapping {
    let Some(event) = params.get("event") else {
        return Mapping::Malformed("missing event");
    };
    let Some(kind) = str_field(event, "type") else {
        return Mapping::Malformed("missing event.type");
    };

    let (level, data) = match kind {
        "largest-contentful-paint" => {
            let details = event.get("lcpDetails").cloned().unwrap_or(Value::Null);
            (
                LogLevel::Info,
                json!({
                    "metric": kind,
                    "renderTime": details.get("renderTime").cloned().unwrap_or(Value::Null),
                    "loadTime": details.get("loadTime").cloned().unwrap_or(Value::Null),
                    "size": details.get("size").cloned().unwrap_or(Value::Null),
                    "url": details.get("url").cloned().unwrap_or(Value::Null),
                }),
            )
        }
        "layout-shift" => {
            let details = event.get("layoutShiftDetails");
            let value = details
                .and_then(|d| d.get("value"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let had_recent_input = details
                .and_then(|d| d.get("hadRecentInput"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let level = if value > LAYOUT_SHIFT_THRESHOLD && !had_recent_input {
                LogLevel::Warn
            } else {
                LogLevel::Info
            };
            (
                level,
                json!({
                    "metric": kind,
                    "value": value,
                    "hadRecentInput": had_recent_input,
                }),
            )
        }
        other => (LogLevel::Info, json!({ "metric": other })),
    };
    Mapping::Entry(Candidate::new(LogType::Performance, level, "performance", data))
}

// ============================================================================
// Page / Security
// ============================================================================

fn page_event(event: &str, params: &Value) -> Mapping {
    let data = json!({
        "event": event,
        "timestamp": params.get("timestamp").cloned().unwrap_or(Value::Null),
    });
    Mapping::Entry(Candidate::new(LogType::Page, LogLevel::Info, "page", data))
}

fn frame_navigated(params: &Value) -> Mapping {
    let Some(frame) = params.get("frame") else {
        return Mapping::Malformed("missing frame");
    };
    let Some(url) = str_field(frame, "url") else {
        return Mapping::Malformed("missing frame.url");
    };
    let main_frame = frame.get("parentId").is_none();
    let level = if main_frame {
        LogLevel::Info
    } else {
        LogLevel::Debug
    };
    let data = json!({
        "event": "navigated",
        "url": url,
        "frameId": frame.get("id").cloned().unwrap_or(Value::Null),
        "mainFrame": main_frame,
    });
    Mapping::Entry(
        Candidate::new(LogType::Page, level, "page", data).with_context(LogContext {
            url: Some(url.to_string()),
            ..Default::default()
        }),
    )
}

fn dialog_opening(params: &Value) -> Mapping {
    let message = str_field(params, "message").unwrap_or_default();
    let data = json!({
        "event": "dialog",
        "dialogType": params.get("type").cloned().unwrap_or(Value::Null),
        "message": message,
    });
    let context = LogContext {
        url: str_field(params, "url").map(str::to_string),
        ..Default::default()
    };
    Mapping::Entry(Candidate::new(LogType::Page, LogLevel::Warn, "page", data).with_context(context))
}

fn security_state(params: &Value) -> Mapping {
    let Some(state) = str_field(params, "securityState") else {
        return Mapping::Malformed("missing securityState");
    };
    let level = match state {
        "insecure" | "insecure-broken" => LogLevel::Warn,
        _ => LogLevel::Info,
    };
    let data = json!({
        "message": format!("Security state changed to {}", state),
        "securityState": state,
        "summary": params.get("summary").cloned().unwrap_or(Value::Null),
    });
    Mapping::Entry(Candidate::new(LogType::Security, level, "security", data))
}

fn certificate_error(params: &Value) -> Mapping {
    let Some(error_type) = str_field(params, "errorType") else {
        return Mapping::Malformed("missing errorType");
    };
    let url = str_field(params, "requestURL");
    let data = json!({
        "message": format!("Certificate error: {}", error_type),
        "errorType": error_type,
        "requestURL": url,
    });
    Mapping::Entry(
        Candidate::new(LogType::Security, LogLevel::Error, "security", data).with_context(
            LogContext {
                url: url.map(str::to_string),
                ..Default::default()
            },
        ),
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Render a `Runtime.RemoteObject` the way a console would print it.
fn render_remote_object(object: &Value) -> String {
    if let Some(value) = object.get("value") {
        return match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    str_field(object, "unserializableValue")
        .or_else(|| str_field(object, "description"))
        .or_else(|| str_field(object, "type"))
        .unwrap_or_default()
        .to_string()
}

struct Frame {
    function: String,
    url: String,
    line: i64,
    column: i64,
}

impl Frame {
    /// `url:line:column`, one-based.
    fn location(&self) -> String {
        format!("{}:{}:{}", self.url, self.line + 1, self.column + 1)
    }
}

fn call_frames(stack: Option<&Value>) -> Vec<Frame> {
    stack
        .and_then(|s| s.get("callFrames"))
        .and_then(Value::as_array)
        .map(|frames| {
            frames
                .iter()
                .filter_map(|f| {
                    let url = str_field(f, "url").filter(|u| !u.is_empty())?;
                    Some(Frame {
                        function: str_field(f, "functionName").unwrap_or_default().to_string(),
                        url: url.to_string(),
                        line: f.get("lineNumber").and_then(Value::as_i64).unwrap_or(0),
                        column: f.get("columnNumber").and_then(Value::as_i64).unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn render_stack(frames: &[Frame]) -> Option<String> {
    if frames.is_empty() {
        return None;
    }
    let lines: Vec<String> = frames
        .iter()
        .map(|f| {
            let function = if f.function.is_empty() {
                "<anonymous>"
            } else {
                &f.function
            };
            format!("    at {} ({})", function, f.location())
        })
        .collect();
    Some(lines.join("\n"))
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
