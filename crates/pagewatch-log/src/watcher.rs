//! File watcher that tails a session log as it grows.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::entry::LogEntry;
use crate::error::LogError;
use crate::reader::LogStore;

/// Default quiet period before a burst of file changes triggers a rescan.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Rescans a [`LogStore`] when its file changes and broadcasts new entries.
pub struct LogWatcher {
    store: Arc<LogStore>,
    debounce: Duration,
    entries_tx: broadcast::Sender<LogEntry>,
    /// Internal watcher handle.
    _watcher: Option<RecommendedWatcher>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl LogWatcher {
    pub fn new(store: Arc<LogStore>) -> Self {
        let (entries_tx, _) = broadcast::channel(1024);
        Self {
            store,
            debounce: DEFAULT_DEBOUNCE,
            entries_tx,
            _watcher: None,
            shutdown_tx: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Receive entries found by future rescans.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.entries_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Start watching. Must be called inside a tokio runtime.
    pub fn start(&mut self) -> Result<(), LogError> {
        if self.is_running() {
            return Ok(());
        }
        let path = self.store.path();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(100);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if let Ok(event) = result {
                    let _ = event_tx.blocking_send(event);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Tailing session log: {}", path.display());

        self._watcher = Some(watcher);
        self.shutdown_tx = Some(shutdown_tx);

        let store = self.store.clone();
        let entries_tx = self.entries_tx.clone();
        let debounce = self.debounce;

        tokio::spawn(async move {
            let mut debounce_timer: Option<tokio::time::Instant> = None;

            // Pick up whatever was written before the watch began.
            Self::rescan(&store, &entries_tx);

            loop {
                tokio::select! {
                    Some(event) = event_rx.recv() => {
                        if Self::is_relevant_event(&event, &path) {
                            debug!("Log change detected: {:?}", event.kind);
                            debounce_timer = Some(tokio::time::Instant::now());
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Log watcher shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {
                        if let Some(timer) = debounce_timer {
                            if timer.elapsed() >= debounce {
                                debounce_timer = None;
                                Self::rescan(&store, &entries_tx);
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    fn is_relevant_event(event: &Event, path: &Path) -> bool {
        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
        ) && event.paths.iter().any(|p| same_file(p, path))
    }

    fn rescan(store: &LogStore, entries_tx: &broadcast::Sender<LogEntry>) {
        match store.refresh() {
            Ok(entries) => {
                for entry in entries {
                    // No receivers is fine.
                    let _ = entries_tx.send(entry);
                }
            }
            Err(e) => error!("Failed to rescan {}: {}", store.path().display(), e),
        }
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        self._watcher = None;
    }
}

impl Drop for LogWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.file_name() == b.file_name(),
    }
}

impl std::fmt::Debug for LogWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWatcher")
            .field("path", &self.store.path())
            .field("running", &self.is_running())
            .finish()
    }
}
