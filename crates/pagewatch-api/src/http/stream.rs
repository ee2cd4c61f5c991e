//! Live entry stream over WebSocket.
//!
//! Each new entry the watcher picks up is sent as one JSON text frame. A
//! client that falls behind receives `{"lagged": n}` and continues from the
//! oldest entry still buffered.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use pagewatch_log::LogEntry;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /logs/stream
pub async fn log_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let watcher = state
        .watcher
        .as_ref()
        .ok_or(ApiError::Unavailable("live log stream"))?;
    let entries = watcher.subscribe();
    Ok(ws.on_upgrade(move |socket| forward(socket, entries)))
}

async fn forward(socket: WebSocket, mut entries: broadcast::Receiver<LogEntry>) {
    info!("Log stream client connected");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            entry = entries.recv() => {
                let text = match entry {
                    Ok(entry) => match serde_json::to_string(&entry) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize entry {}: {}", entry.id, e);
                            continue;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Log stream client lagged by {} entries", skipped);
                        json!({ "lagged": skipped }).to_string()
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("Log stream socket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    info!("Log stream client disconnected");
}
