//! The monitoring pipeline: protocol events in, session log entries out.
//!
//! ```text
//! ProtocolSession ──events──▶ EventNormalizer ──▶ enrich ──▶ LogWriter
//!                                                   │
//!                                                   └──▶ ScreenshotTrigger ──▶ ControlBridge
//! ```
//!
//! One consumer task handles events strictly in arrival order, so entries are
//! written in emission order no matter what the control bridge is doing.

use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use pagewatch_cdp::{CdpEvent, ProtocolSession};
use pagewatch_control::ControlBridge;
use pagewatch_log::{
    EventNormalizer, LogEntry, LogWriter, NormalizerStats, ScreenshotIndex, SessionMetadata, enrich,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::trigger::{ScreenshotTrigger, TriggerStats};

/// Pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub normalizer: NormalizerStats,
    pub written: u64,
    pub write_errors: u64,
    pub screenshots: TriggerStats,
}

/// A running pipeline. Call [`MonitorPipeline::stop`] to flush and close
/// the log.
pub struct MonitorPipeline {
    writer: Arc<LogWriter>,
    stats: Arc<Mutex<PipelineStats>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MonitorPipeline {
    /// Create the session log and start consuming `session` events.
    ///
    /// With a `bridge`, the screenshot trigger captures through it.
    /// Must be called inside a tokio runtime.
    pub fn start(
        session: Arc<dyn ProtocolSession>,
        bridge: Option<Arc<ControlBridge>>,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        let started = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut metadata = SessionMetadata::new(started, config.filter.clone());
        if let Some(url) = &config.target_url {
            metadata = metadata.with_target_url(url.clone());
        }
        let writer = Arc::new(LogWriter::create(&config.log_dir, metadata)?);

        let index = config
            .screenshot_dir
            .as_deref()
            .map(ScreenshotIndex::from_dir)
            .unwrap_or_default();
        let index = Arc::new(Mutex::new(index));

        let trigger = match bridge {
            Some(bridge) if config.trigger.enabled => Some(ScreenshotTrigger::new(
                bridge,
                config.trigger.clone(),
                index.clone(),
            )),
            _ => None,
        };

        // Subscribe before spawning so nothing emitted from here on is missed.
        let events = session.subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stats = Arc::new(Mutex::new(PipelineStats::default()));

        let consumer = Consumer {
            normalizer: EventNormalizer::new(config.filter),
            writer: writer.clone(),
            index,
            trigger,
            stats: stats.clone(),
            written: 0,
            write_errors: 0,
        };
        let task = tokio::spawn(consumer.run(events, shutdown_rx));

        Ok(Self {
            writer,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn log_path(&self) -> &Path {
        self.writer.path()
    }

    pub fn writer(&self) -> &Arc<LogWriter> {
        &self.writer
    }

    pub fn stats(&self) -> PipelineStats {
        *self.stats.lock()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop consuming: events already delivered are still written, pending
    /// screenshots finish, then the log is flushed and closed.
    pub async fn stop(mut self) -> Result<PipelineStats, MonitorError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| MonitorError::Task(e.to_string()))?;
        }
        self.writer.close()?;

        let stats = self.stats();
        info!(
            "Session log closed: {} entries written to {}",
            stats.written,
            self.writer.path().display()
        );
        Ok(stats)
    }
}

impl Drop for MonitorPipeline {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for MonitorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorPipeline")
            .field("log", &self.writer.path())
            .field("running", &self.is_running())
            .finish()
    }
}

struct Consumer {
    normalizer: EventNormalizer,
    writer: Arc<LogWriter>,
    index: Arc<Mutex<ScreenshotIndex>>,
    trigger: Option<ScreenshotTrigger>,
    stats: Arc<Mutex<PipelineStats>>,
    written: u64,
    write_errors: u64,
}

impl Consumer {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<CdpEvent>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        debug!("Event stream closed");
                        break;
                    }
                },
                _ = &mut shutdown_rx => {
                    while let Ok(event) = events.try_recv() {
                        self.handle(event).await;
                    }
                    debug!("Pipeline consumer shutting down");
                    break;
                }
            }
        }

        if let Some(trigger) = &mut self.trigger {
            trigger.drain().await;
        }
        self.publish();
    }

    async fn handle(&mut self, event: CdpEvent) {
        if let Some(raw) = self.normalizer.normalize(&event.method, &event.params) {
            let entry = enrich(raw, &self.index.lock());
            if let Some(entry) = self.append(entry).await {
                if let Some(trigger) = &mut self.trigger {
                    trigger.observe(&entry);
                }
            }
        }
        self.publish();
    }

    /// Append on the blocking pool; each append syncs the file.
    ///
    /// Awaited before the next event is taken, so write order is arrival
    /// order.
    async fn append(&mut self, entry: LogEntry) -> Option<LogEntry> {
        let writer = self.writer.clone();
        let appended = tokio::task::spawn_blocking(move || {
            let result = writer.append(&entry);
            (entry, result)
        })
        .await;

        match appended {
            Ok((entry, Ok(()))) => {
                self.written += 1;
                Some(entry)
            }
            Ok((entry, Err(e))) => {
                error!("Failed to append {} entry: {}", entry.entry_type(), e);
                self.write_errors += 1;
                Some(entry)
            }
            Err(e) => {
                error!("Log append task failed: {}", e);
                self.write_errors += 1;
                None
            }
        }
    }

    fn publish(&self) {
        let mut stats = self.stats.lock();
        stats.normalizer = self.normalizer.stats();
        stats.written = self.written;
        stats.write_errors = self.write_errors;
        if let Some(trigger) = &self.trigger {
            stats.screenshots = trigger.stats();
        }
    }
}
