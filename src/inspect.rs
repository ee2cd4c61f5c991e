//! The `inspect` and `tools` commands.

use std::fmt::Write as _;
use std::path::Path;

use serde_json::{Value, json};

use pagewatch_control::control_tools;
use pagewatch_log::query::errors_only;
use pagewatch_log::{LogEntry, ParsedLog, load};

/// Load a session log once and print it.
pub(crate) fn inspect(
    file: &Path,
    screenshot_dir: Option<&Path>,
    errors: bool,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(file, screenshot_dir)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&to_json(&parsed, errors))?);
    } else {
        print!("{}", render_text(&parsed, errors));
    }
    Ok(())
}

fn selected(parsed: &ParsedLog, errors: bool) -> Vec<&LogEntry> {
    if errors {
        errors_only(&parsed.entries)
    } else {
        parsed.entries.iter().collect()
    }
}

fn to_json(parsed: &ParsedLog, errors: bool) -> Value {
    json!({
        "metadata": parsed.metadata,
        "stats": parsed.stats(),
        "parseErrors": parsed.parse_errors,
        "validationErrors": parsed.validation_errors,
        "entries": selected(parsed, errors),
    })
}

fn render_text(parsed: &ParsedLog, errors: bool) -> String {
    let mut out = String::new();
    let stats = parsed.stats();

    if let Some(metadata) = &parsed.metadata {
        let _ = writeln!(out, "Session started {}", metadata.session_start);
        if let Some(url) = &metadata.target_url {
            let _ = writeln!(out, "Target {}", url);
        }
    }
    let _ = writeln!(
        out,
        "{} entries: {} errors, {} warnings, {} failed requests, {} slow metrics",
        stats.total, stats.errors, stats.warnings, stats.failed_requests, stats.slow_performance
    );
    if let Some(span) = &stats.time_span {
        let _ = writeln!(out, "Span {} .. {} ({} ms)", span.start, span.end, span.duration_ms);
    }
    // validation failures are included in parse_errors
    if parsed.parse_errors > 0 {
        let _ = writeln!(
            out,
            "Skipped {} records ({} missing required fields)",
            parsed.parse_errors, parsed.validation_errors
        );
    }
    let _ = writeln!(out);

    for entry in selected(parsed, errors) {
        let marker = if entry.has_screenshot { " [screenshot]" } else { "" };
        let _ = writeln!(
            out,
            "{} s{} {}{}",
            entry.timestamp(),
            entry.severity,
            entry.summary,
            marker
        );
    }
    out
}

/// Print the control tool definitions.
pub(crate) fn print_tools(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let tools = control_tools();
    let rendered: Vec<Value> = match format {
        "native" => tools
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?,
        "anthropic" => tools.iter().map(|t| t.to_anthropic_tool()).collect(),
        "openai" => tools.iter().map(|t| t.to_openai_function()).collect(),
        other => return Err(format!("Unknown tool format: {}", other).into()),
    };
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewatch_log::{
        LogFilter, LogLevel, LogType, LogWriter, RawEntry, ScreenshotIndex, SessionMetadata,
        enrich,
    };

    fn sample() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let writer = LogWriter::create(
            dir.path(),
            SessionMetadata::new("2024-05-01T10:20:00.000Z", LogFilter::default())
                .with_target_url("https://shop.test/"),
        )
        .unwrap();
        for (second, level, message) in [
            (1, LogLevel::Info, "cart loaded"),
            (2, LogLevel::Error, "checkout failed"),
        ] {
            let raw = RawEntry {
                timestamp: format!("2024-05-01T10:20:{:02}.000Z", second),
                entry_type: LogType::Console,
                level,
                source: "console".to_string(),
                data: json!({ "message": message }),
                context: None,
            };
            writer.append(&enrich(raw, &ScreenshotIndex::new())).unwrap();
        }
        let path = writer.path().to_path_buf();
        (dir, path)
    }

    #[test]
    fn test_render_text() {
        let (_dir, path) = sample();
        let parsed = load(&path, None).unwrap();

        let text = render_text(&parsed, false);
        assert!(text.contains("Session started 2024-05-01T10:20:00.000Z"));
        assert!(text.contains("Target https://shop.test/"));
        assert!(text.contains("2 entries: 1 errors"));
        assert!(text.contains("cart loaded"));
        assert!(text.contains("checkout failed"));

        let errors = render_text(&parsed, true);
        assert!(!errors.contains("cart loaded"));
        assert!(errors.contains("checkout failed"));
    }

    #[test]
    fn test_json_output() {
        let (_dir, path) = sample();
        let parsed = load(&path, None).unwrap();
        let value = to_json(&parsed, true);
        assert_eq!(value["stats"]["total"], 2);
        assert_eq!(value["entries"].as_array().unwrap().len(), 1);
        assert_eq!(value["metadata"]["targetUrl"], "https://shop.test/");
    }

    #[test]
    fn test_unknown_tool_format() {
        assert!(print_tools("yaml").is_err());
    }
}
