//! Screenshot trigger: capture the page when a serious error is logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pagewatch_control::ControlBridge;
use pagewatch_log::{LogEntry, ScreenshotIndex};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TriggerConfig;

/// Trigger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerStats {
    /// Captures requested.
    pub fired: u64,
    /// Qualifying entries skipped inside the cooldown window.
    pub suppressed: u64,
    pub captured: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    fired: AtomicU64,
    suppressed: AtomicU64,
    captured: AtomicU64,
    failed: AtomicU64,
}

/// Fires a capture for error entries at or above the severity threshold, at
/// most once per cooldown window.
///
/// Captures run on their own task and go through the control bridge queue,
/// so the event path never waits for them.
pub struct ScreenshotTrigger {
    bridge: Arc<ControlBridge>,
    config: TriggerConfig,
    index: Arc<Mutex<ScreenshotIndex>>,
    last_fired: Option<Instant>,
    pending: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl ScreenshotTrigger {
    pub fn new(
        bridge: Arc<ControlBridge>,
        config: TriggerConfig,
        index: Arc<Mutex<ScreenshotIndex>>,
    ) -> Self {
        Self {
            bridge,
            config,
            index,
            last_fired: None,
            pending: Vec::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Whether `entry` is serious enough to capture, ignoring the cooldown.
    pub fn qualifies(&self, entry: &LogEntry) -> bool {
        self.config.enabled && entry.is_error() && entry.severity >= self.config.min_severity
    }

    /// Look at a freshly written entry; returns whether a capture was started.
    pub fn observe(&mut self, entry: &LogEntry) -> bool {
        if !self.qualifies(entry) {
            return false;
        }

        let now = Instant::now();
        if let Some(last) = self.last_fired {
            if now.duration_since(last) < self.config.cooldown {
                debug!("Screenshot for {} suppressed by cooldown", entry.id);
                self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
        self.last_fired = Some(now);
        self.counters.fired.fetch_add(1, Ordering::Relaxed);
        self.pending.retain(|task| !task.is_finished());

        let bridge = self.bridge.clone();
        let index = self.index.clone();
        let counters = self.counters.clone();
        let timestamp = entry.timestamp().to_string();
        let context = entry.category.clone();
        let id = entry.id.clone();

        self.pending.push(tokio::spawn(async move {
            match bridge.capture_at(&timestamp, &context).await {
                Ok(shot) => {
                    info!("Captured {} for entry {}", shot.name, id);
                    index.lock().insert_file_name(&shot.name);
                    counters.captured.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!("Screenshot for entry {} failed: {}", id, e);
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
        true
    }

    pub fn stats(&self) -> TriggerStats {
        TriggerStats {
            fired: self.counters.fired.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            captured: self.counters.captured.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Wait for captures still in progress.
    pub async fn drain(&mut self) {
        for task in self.pending.drain(..) {
            if let Err(e) = task.await {
                warn!("Screenshot task ended abnormally: {}", e);
            }
        }
    }
}
