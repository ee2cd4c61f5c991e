//! Reading session logs: one-shot loads and incremental tails.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::correlation::ScreenshotIndex;
use crate::entry::LogEntry;
use crate::error::LogError;
use crate::scanner::{LogScanner, ParsedLog};

/// Read a whole log file at once.
///
/// A truncated trailing record is counted as one parse error.
pub fn load(path: &Path, screenshot_dir: Option<&Path>) -> Result<ParsedLog, LogError> {
    let bytes = std::fs::read(path)?;
    let screenshots = screenshot_dir
        .map(ScreenshotIndex::from_dir)
        .unwrap_or_default();
    let mut scanner = LogScanner::with_screenshots(screenshots);
    scanner.scan(0, &bytes);
    scanner.finish();
    Ok(scanner.into_parsed())
}

/// Incremental reader that remembers how far it got.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    scanner: LogScanner,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scanner: LogScanner::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scanner(&self) -> &LogScanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut LogScanner {
        &mut self.scanner
    }

    /// Read bytes appended since the last refresh and return the entries
    /// they completed.
    ///
    /// If the file became shorter than the scanned position it was replaced
    /// or truncated, and the tail starts over from the beginning.
    pub fn refresh(&mut self) -> Result<Vec<LogEntry>, LogError> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        let mut position = self.scanner.position();

        if len < position {
            warn!(
                "Log {} shrank from {} to {} bytes, rescanning",
                self.path.display(),
                position,
                len
            );
            self.scanner.reset();
            position = 0;
        }
        if len == position {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(position))?;
        let mut buf = Vec::with_capacity((len - position) as usize);
        file.read_to_end(&mut buf)?;

        let before = self.scanner.entries().len();
        let added = self.scanner.scan(position, &buf);
        if added > 0 {
            debug!("Read {} new entries from {}", added, self.path.display());
        }
        Ok(self.scanner.entries()[before..].to_vec())
    }
}

/// A [`LogTail`] shared between readers.
///
/// Refreshes are serialised by the lock, so two rescans of the same growing
/// file never interleave.
#[derive(Debug)]
pub struct LogStore {
    tail: Mutex<LogTail>,
    screenshot_dir: Option<PathBuf>,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>, screenshot_dir: Option<PathBuf>) -> Self {
        Self {
            tail: Mutex::new(LogTail::new(path)),
            screenshot_dir,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.tail.lock().path().to_path_buf()
    }

    pub fn screenshot_dir(&self) -> Option<&Path> {
        self.screenshot_dir.as_deref()
    }

    /// Pick up appended records; returns the new entries.
    pub fn refresh(&self) -> Result<Vec<LogEntry>, LogError> {
        let mut tail = self.tail.lock();
        if let Some(dir) = &self.screenshot_dir {
            tail.scanner_mut().set_screenshots(ScreenshotIndex::from_dir(dir));
        }
        tail.refresh()
    }

    /// Current contents, without reading the file.
    pub fn snapshot(&self) -> ParsedLog {
        self.tail.lock().scanner().snapshot()
    }

    /// Refresh, then return the current contents.
    pub fn load(&self) -> Result<ParsedLog, LogError> {
        let mut tail = self.tail.lock();
        if let Some(dir) = &self.screenshot_dir {
            tail.scanner_mut().set_screenshots(ScreenshotIndex::from_dir(dir));
        }
        tail.refresh()?;
        Ok(tail.scanner().snapshot())
    }
}
