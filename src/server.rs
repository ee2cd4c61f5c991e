//! Tracing setup and the `run` command.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pagewatch_api::{ApiServer, AppState};
use pagewatch_cdp::{CdpSession, CdpSessionConfig, ProtocolSession};
use pagewatch_config::{Config, ConfigValidator, data_dir};
use pagewatch_control::{BridgeConfig, ControlBridge, ScreenshotStore};
use pagewatch_log::{LogStore, LogWatcher};
use pagewatch_monitor::{MonitorConfig, MonitorPipeline};

/// Initialize tracing with console and file output.
///
/// Diagnostic logs go to stderr and to `~/.pagewatch/debug/` with daily
/// rotation. Stdout is left to command output.
pub(crate) fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = data_dir().join("debug");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("pagewatch")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keeps the background writer alive for the life of the process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Attach to the browser and run until Ctrl-C.
///
/// Shutdown order: HTTP server, pipeline (flushes and closes the log),
/// then the protocol session.
pub(crate) async fn run_monitor(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting pagewatch v{}", env!("CARGO_PKG_VERSION"));

    for warning in ConfigValidator::validate(&config).into_result()? {
        warn!("Config: {} {}", warning.path, warning.message);
    }

    let cdp = CdpSession::connect(CdpSessionConfig::from(&config.browser)).await?;
    let target_url = cdp.target().map(|page| page.url);
    let session: Arc<dyn ProtocolSession> = Arc::new(cdp);

    let bridge = Arc::new(ControlBridge::new(
        session.clone(),
        BridgeConfig::from(&config.control),
        ScreenshotStore::new(&config.screenshots.dir),
    ));

    let mut monitor_config = MonitorConfig::from_config(&config)?;
    if let Some(url) = target_url {
        monitor_config = monitor_config.with_target_url(url);
    }
    let pipeline = MonitorPipeline::start(session.clone(), Some(bridge.clone()), monitor_config)?;

    let store = Arc::new(LogStore::new(
        pipeline.log_path(),
        Some(config.screenshots.dir.clone()),
    ));
    let mut watcher = LogWatcher::new(store.clone());
    watcher.start()?;
    let watcher = Arc::new(watcher);

    let state = AppState::new(store, ScreenshotStore::new(&config.screenshots.dir))
        .with_bridge(bridge)
        .with_watcher(watcher);
    let server = ApiServer::new(config.server.clone(), Arc::new(state));
    let served = server.run(shutdown_signal()).await;
    drop(server);

    let stats = pipeline.stop().await?;
    info!(
        "Session summary: {} written, {} filtered, {} malformed, {} screenshots",
        stats.written,
        stats.normalizer.filtered,
        stats.normalizer.malformed,
        stats.screenshots.captured
    );
    session.close().await;
    info!("Browser session closed");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
