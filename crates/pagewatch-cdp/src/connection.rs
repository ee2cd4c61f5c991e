//! Connection actor: the only owner of the WebSocket stream.
//!
//! ```text
//!  callers ──Command──► mpsc ──► ┌───────────────┐ ──text──► WebSocket
//!                                │  actor task   │
//!  subscribers ◄──CdpEvent────── └───────────────┘ ◄──text── WebSocket
//! ```
//!
//! Responses are matched to their pending oneshot by id; everything else is
//! an event and is fanned out to subscribers in arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::CdpError;
use crate::network::InflightTracker;
use crate::protocol::{CdpEvent, CdpMessage, CdpRequest};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Reply = oneshot::Sender<Result<Value, CdpError>>;

/// Messages accepted by the actor.
pub(crate) enum Command {
    Call {
        id: u64,
        method: String,
        params: Option<Value>,
        reply: Reply,
    },
    /// The caller gave up waiting; drop its pending slot.
    Forget(u64),
    Close,
}

/// Sends [`Command::Forget`] when dropped unless the reply arrived.
///
/// Held across the wait for a response, so a caller that times out or is
/// itself dropped mid-call still releases its pending slot in the actor.
pub(crate) struct PendingCall {
    id: u64,
    cmd_tx: Option<mpsc::UnboundedSender<Command>>,
}

impl PendingCall {
    pub fn new(id: u64, cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            id,
            cmd_tx: Some(cmd_tx),
        }
    }

    /// The actor already removed the slot.
    pub fn resolved(mut self) {
        self.cmd_tx = None;
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            trace!("Forgetting abandoned request {}", self.id);
            let _ = cmd_tx.send(Command::Forget(self.id));
        }
    }
}

/// State that outlives a single connection.
#[derive(Default)]
pub(crate) struct Shared {
    pub subscribers: Mutex<Vec<mpsc::UnboundedSender<CdpEvent>>>,
    pub inflight: Mutex<InflightTracker>,
}

impl Shared {
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CdpEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: CdpEvent) {
        self.inflight.lock().observe(&event);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Handle to a running actor.
pub(crate) struct ConnectionHandle {
    pub cmd_tx: mpsc::UnboundedSender<Command>,
    pub connected: Arc<AtomicBool>,
    pub task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn spawn(ws: WsStream, shared: Arc<Shared>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run(ws, cmd_rx, shared, connected.clone()));
        Self {
            cmd_tx,
            connected,
            task,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.cmd_tx.is_closed()
    }

    /// Ask the actor to close and wait briefly for it to finish.
    pub async fn shutdown(self) {
        let _ = self.cmd_tx.send(Command::Close);
        let abort = self.task.abort_handle();
        if tokio::time::timeout(std::time::Duration::from_secs(2), self.task)
            .await
            .is_err()
        {
            warn!("CDP connection did not close in time, aborting");
            abort.abort();
        }
    }
}

async fn run(
    ws: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
    connected: Arc<AtomicBool>,
) {
    let (mut sink, mut source) = ws.split();
    let mut pending: HashMap<u64, Reply> = HashMap::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Call { id, method, params, reply }) => {
                    let request = CdpRequest { id, method, params };
                    let json = match serde_json::to_string(&request) {
                        Ok(json) => json,
                        Err(e) => {
                            let _ = reply.send(Err(e.into()));
                            continue;
                        }
                    };
                    trace!("CDP send: {}", json);
                    pending.insert(id, reply);
                    if let Err(e) = sink.send(Message::Text(json.into())).await {
                        error!("WebSocket send failed: {}", e);
                        if let Some(reply) = pending.remove(&id) {
                            let _ = reply.send(Err(e.into()));
                        }
                        break;
                    }
                }
                Some(Command::Forget(id)) => {
                    pending.remove(&id);
                }
                Some(Command::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    trace!("CDP recv: {}", text);
                    dispatch(&text, &mut pending, &shared);
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("WebSocket closed by target");
                    break;
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(CdpError::SessionClosed));
    }
    debug!("CDP connection actor stopped");
}

/// Route one inbound text frame.
pub(crate) fn dispatch(text: &str, pending: &mut HashMap<u64, Reply>, shared: &Shared) {
    let msg = match serde_json::from_str::<CdpMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to parse CDP message: {}", e);
            return;
        }
    };

    if let Some(id) = msg.id {
        if let Some(reply) = pending.remove(&id) {
            let result = match msg.error {
                Some(error) => Err(CdpError::Protocol {
                    code: error.code,
                    message: error.message,
                }),
                None => Ok(msg.result.unwrap_or(Value::Null)),
            };
            let _ = reply.send(result);
        } else {
            trace!("Dropping response for abandoned request {}", id);
        }
    } else if let Some(method) = msg.method {
        shared.publish(CdpEvent::new(method, msg.params.unwrap_or(Value::Null)));
    }
}
