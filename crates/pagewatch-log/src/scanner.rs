//! Incremental record scanner.
//!
//! The scanner walks raw log bytes with a small state machine. Outside an
//! object it skips whitespace, separator lines and header lines; at `{` it
//! tracks brace depth (ignoring braces inside JSON strings) until the depth
//! returns to zero, then decodes the buffered object. A `---` separator line
//! always ends an object, so one unterminated record is discarded on its own
//! instead of swallowing the records after it.
//!
//! Only complete units advance [`LogScanner::position`]. A trailing partial
//! record is left unconsumed so the next scan, fed from the same position
//! with more bytes, picks it up whole. Bytes before the position are skipped,
//! so feeding the same range twice never duplicates entries.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::correlation::ScreenshotIndex;
use crate::enrich::enrich;
use crate::entry::{LogEntry, RawEntry, SessionMetadata};
use crate::stats::LogStats;

/// What the last scan left unconsumed at the end of its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Pending {
    #[default]
    Nothing,
    /// An object whose braces never balanced.
    Object,
    /// A line without a terminating newline.
    Line { skippable: bool },
}

/// Incremental scanner over a growing session log.
#[derive(Debug, Default)]
pub struct LogScanner {
    position: u64,
    pending: Pending,
    metadata: Option<SessionMetadata>,
    entries: Vec<LogEntry>,
    parse_errors: u64,
    validation_errors: u64,
    screenshots: ScreenshotIndex,
}

impl LogScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screenshots(screenshots: ScreenshotIndex) -> Self {
        Self {
            screenshots,
            ..Self::default()
        }
    }

    /// Index used to compute `hasScreenshot` for entries scanned from now on.
    pub fn set_screenshots(&mut self, screenshots: ScreenshotIndex) {
        self.screenshots = screenshots;
    }

    pub fn screenshots(&self) -> &ScreenshotIndex {
        &self.screenshots
    }

    /// Absolute byte offset up to which input has been consumed.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Malformed records, including records that failed validation.
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    /// Well-formed records missing a required field.
    pub fn validation_errors(&self) -> u64 {
        self.validation_errors
    }

    /// Forget everything and start again from offset zero.
    pub fn reset(&mut self) {
        let screenshots = std::mem::take(&mut self.screenshots);
        *self = Self::with_screenshots(screenshots);
    }

    /// Scan `bytes`, which start at absolute file offset `offset`.
    ///
    /// Returns the number of entries added by this call.
    pub fn scan(&mut self, offset: u64, bytes: &[u8]) -> usize {
        let before = self.entries.len();
        let end = offset + bytes.len() as u64;
        if end <= self.position {
            return 0;
        }
        if offset > self.position {
            warn!(
                "Log scan skipped bytes {}..{} that were never read",
                self.position, offset
            );
            self.position = offset;
        }

        let input = &bytes[(self.position - offset) as usize..];
        let mut consumed = 0;
        self.pending = Pending::Nothing;

        while consumed < input.len() {
            let rest = &input[consumed..];
            let byte = rest[0];
            if byte.is_ascii_whitespace() {
                consumed += 1;
            } else if byte == b'{' {
                match object_extent(rest) {
                    Extent::Complete(len) => {
                        self.record(&rest[..len]);
                        consumed += len;
                    }
                    Extent::Broken(len) => {
                        debug!(
                            "Discarding unterminated record at {}",
                            self.position + consumed as u64
                        );
                        self.parse_errors += 1;
                        consumed += len;
                    }
                    Extent::Incomplete => {
                        self.pending = Pending::Object;
                        break;
                    }
                }
            } else {
                match rest.iter().position(|&b| b == b'\n') {
                    Some(newline) => {
                        self.skip_line(&rest[..newline]);
                        consumed += newline + 1;
                    }
                    None => {
                        self.pending = Pending::Line {
                            skippable: is_skippable_line(rest),
                        };
                        break;
                    }
                }
            }
        }

        self.position += consumed as u64;
        self.entries.len() - before
    }

    /// Account for whatever the last scan left unconsumed.
    ///
    /// Call after the final scan of a one-shot load: a truncated trailing
    /// record counts as one parse error.
    pub fn finish(&mut self) {
        match std::mem::take(&mut self.pending) {
            Pending::Object | Pending::Line { skippable: false } => {
                debug!("Truncated trailing record at offset {}", self.position);
                self.parse_errors += 1;
            }
            Pending::Line { skippable: true } | Pending::Nothing => {}
        }
    }

    pub fn into_parsed(self) -> ParsedLog {
        ParsedLog {
            metadata: self.metadata,
            entries: self.entries,
            parse_errors: self.parse_errors,
            validation_errors: self.validation_errors,
        }
    }

    /// Copy of the current state, with `hasScreenshot` re-evaluated against
    /// the current screenshot index.
    pub fn snapshot(&self) -> ParsedLog {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let mut entry = entry.clone();
                entry.has_screenshot = self.screenshots.matches(entry.timestamp());
                entry
            })
            .collect();
        ParsedLog {
            metadata: self.metadata.clone(),
            entries,
            parse_errors: self.parse_errors,
            validation_errors: self.validation_errors,
        }
    }

    fn record(&mut self, bytes: &[u8]) {
        let value: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(e) => {
                debug!("Discarding malformed record at {}: {}", self.position, e);
                self.parse_errors += 1;
                return;
            }
        };

        if self.metadata.is_none() && self.entries.is_empty() && SessionMetadata::matches(&value)
        {
            match serde_json::from_value::<SessionMetadata>(value) {
                Ok(metadata) => self.metadata = Some(metadata),
                Err(e) => {
                    debug!("Discarding malformed session header: {}", e);
                    self.parse_errors += 1;
                }
            }
            return;
        }

        match RawEntry::from_value(&value) {
            Ok(raw) => self.entries.push(enrich(raw, &self.screenshots)),
            Err(rejection) => {
                debug!("Discarding invalid record: {}", rejection);
                self.parse_errors += 1;
                self.validation_errors += 1;
            }
        }
    }

    fn skip_line(&mut self, line: &[u8]) {
        if !is_skippable_line(line) {
            debug!(
                "Discarding stray line: {}",
                String::from_utf8_lossy(line).trim()
            );
            self.parse_errors += 1;
        }
    }
}

/// Blank, `---` separator, or markdown header line.
fn is_skippable_line(line: &[u8]) -> bool {
    let line = line.trim_ascii();
    line.is_empty() || line == b"---" || line.starts_with(b"#")
}

/// How far an object starting at `{` extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extent {
    /// Balanced object of this length.
    Complete(usize),
    /// Hit a `---` separator line before balancing; the length runs through
    /// the separator's newline.
    Broken(usize),
    /// Ran out of input.
    Incomplete,
}

/// Find the end of the object at the start of `bytes`.
///
/// A line that is exactly `---` cannot occur inside a JSON value, so it ends
/// the object regardless of brace or string state.
fn object_extent(bytes: &[u8]) -> Extent {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if byte == b'\n' {
            let line_start = i + 1;
            if let Some(len) = bytes[line_start..].iter().position(|&b| b == b'\n') {
                if bytes[line_start..line_start + len].trim_ascii() == b"---" {
                    return Extent::Broken(line_start + len + 1);
                }
            }
        }
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Extent::Complete(i + 1);
                }
            }
            _ => {}
        }
    }
    Extent::Incomplete
}

/// Result of reading a whole log.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedLog {
    pub metadata: Option<SessionMetadata>,
    pub entries: Vec<LogEntry>,
    pub parse_errors: u64,
    pub validation_errors: u64,
}

impl ParsedLog {
    pub fn stats(&self) -> LogStats {
        LogStats::compute(&self.entries)
    }
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
