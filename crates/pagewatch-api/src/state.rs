//! Application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use pagewatch_control::{ControlBridge, ScreenshotStore};
use pagewatch_log::{LogStore, LogWatcher};

/// State shared across handlers.
pub struct AppState {
    /// Absent when serving a finished log without a browser.
    pub bridge: Option<Arc<ControlBridge>>,
    pub logs: Arc<LogStore>,
    pub screenshots: ScreenshotStore,
    /// Source of the live entry stream.
    pub watcher: Option<Arc<LogWatcher>>,
    start_time: Instant,
    request_count: AtomicU64,
}

impl AppState {
    pub fn new(logs: Arc<LogStore>, screenshots: ScreenshotStore) -> Self {
        Self {
            bridge: None,
            logs,
            screenshots,
            watcher: None,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<ControlBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_watcher(mut self, watcher: Arc<LogWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Control requests served so far.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("log", &self.logs.path())
            .field("screenshots", &self.screenshots.dir())
            .field("bridge", &self.bridge.is_some())
            .finish()
    }
}
