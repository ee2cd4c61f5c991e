//! Append-only session log writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::correlation::{CORRELATION_KEY_LEN, file_stamp};
use crate::entry::{LogEntry, SessionMetadata};
use crate::error::LogError;

/// First line of every session log.
pub const LOG_HEADER: &str = "# pagewatch session log";

/// Line written after every record.
pub const RECORD_SEPARATOR: &str = "---";

struct WriterState {
    file: Option<BufWriter<File>>,
    appended: u64,
}

/// Writes one session log: a header line, the session metadata, then one
/// pretty-printed JSON record per entry.
///
/// `append` holds a lock for the whole write so concurrent callers cannot
/// interleave records, and it syncs before returning.
pub struct LogWriter {
    path: PathBuf,
    metadata: SessionMetadata,
    state: Mutex<WriterState>,
}

impl LogWriter {
    /// Create a new `session-<stamp>.log` in `dir`.
    pub fn create(dir: &Path, metadata: SessionMetadata) -> Result<Self, LogError> {
        std::fs::create_dir_all(dir)?;
        let base = session_file_stem(&metadata.session_start);

        let mut suffix = 0u32;
        loop {
            let name = if suffix == 0 {
                format!("{}.log", base)
            } else {
                format!("{}-{}.log", base, suffix)
            };
            match Self::create_at(&dir.join(name), metadata.clone()) {
                Err(LogError::Io(e)) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                other => return other,
            }
        }
    }

    /// Create the log at an explicit path. Fails if the file already exists.
    pub fn create_at(path: &Path, metadata: SessionMetadata) -> Result<Self, LogError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let mut file = BufWriter::new(file);

        writeln!(file, "{}", LOG_HEADER)?;
        writeln!(file)?;
        serde_json::to_writer_pretty(&mut file, &metadata)?;
        write!(file, "\n{}\n", RECORD_SEPARATOR)?;
        file.flush()?;
        file.get_ref().sync_data()?;

        info!("Session log created at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            state: Mutex::new(WriterState {
                file: Some(file),
                appended: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Number of entries appended so far.
    pub fn appended(&self) -> u64 {
        self.state.lock().appended
    }

    /// Append one entry and flush it to disk.
    pub fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        let record = serde_json::to_string_pretty(entry)?;

        let mut state = self.state.lock();
        let file = state.file.as_mut().ok_or(LogError::Closed)?;
        file.write_all(record.as_bytes())?;
        write!(file, "\n{}\n", RECORD_SEPARATOR)?;
        file.flush()?;
        file.get_ref().sync_data()?;
        state.appended += 1;
        Ok(())
    }

    /// Flush and close. Further appends fail with [`LogError::Closed`].
    pub fn close(&self) -> Result<(), LogError> {
        let mut state = self.state.lock();
        if let Some(mut file) = state.file.take() {
            file.flush()?;
            file.get_ref().sync_all()?;
            debug!(
                "Session log {} closed after {} entries",
                self.path.display(),
                state.appended
            );
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().file.is_none()
    }
}

/// `session-YYYY-MM-DDTHH-MM-SS`
fn session_file_stem(session_start: &str) -> String {
    let prefix: String = session_start.chars().take(CORRELATION_KEY_LEN).collect();
    format!("session-{}", file_stamp(&prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{LogLevel, LogType, RawEntry};
    use crate::filter::LogFilter;
    use serde_json::json;

    fn metadata() -> SessionMetadata {
        SessionMetadata::new("2024-05-01T10:20:30.000Z", LogFilter::default())
    }

    fn entry(n: u64) -> LogEntry {
        LogEntry {
            raw: RawEntry {
                timestamp: format!("2024-05-01T10:20:3{}.000Z", n),
                entry_type: LogType::Console,
                level: LogLevel::Info,
                source: "console".to_string(),
                data: json!({"message": format!("entry {}", n)}),
                context: None,
            },
            id: format!("id{}", n),
            severity: 2,
            category: "console_info".to_string(),
            summary: format!("[info] console: entry {}", n),
            has_screenshot: false,
        }
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let writer = LogWriter::create(dir.path(), metadata()).unwrap();
        writer.append(&entry(1)).unwrap();

        assert_eq!(
            writer.path().file_name().unwrap(),
            "session-2024-05-01T10-20-30.log"
        );
        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert!(text.starts_with("# pagewatch session log\n\n{\n"));
        assert!(text.contains("\"sessionStart\": \"2024-05-01T10:20:30.000Z\""));
        assert_eq!(text.matches("\n---\n").count(), 2);
        assert!(text.ends_with("}\n---\n"));
        assert_eq!(writer.appended(), 1);
    }

    #[test]
    fn test_same_second_sessions_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let first = LogWriter::create(dir.path(), metadata()).unwrap();
        let second = LogWriter::create(dir.path(), metadata()).unwrap();
        assert_ne!(first.path(), second.path());
        assert_eq!(
            second.path().file_name().unwrap(),
            "session-2024-05-01T10-20-30-1.log"
        );
    }

    #[test]
    fn test_append_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = LogWriter::create(dir.path(), metadata()).unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(matches!(writer.append(&entry(1)), Err(LogError::Closed)));
        writer.close().unwrap();
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let writer = std::sync::Arc::new(LogWriter::create(dir.path(), metadata()).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let writer = writer.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        writer.append(&entry(n)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = std::fs::read_to_string(writer.path()).unwrap();
        let records: Vec<&str> = text.split("\n---\n").filter(|r| !r.is_empty()).collect();
        assert_eq!(records.len(), 41);
        for record in &records[1..] {
            let value: serde_json::Value = serde_json::from_str(record).unwrap();
            assert_eq!(value["level"], "info");
        }
    }
}
