//! In-memory protocol session for tests.
//!
//! Commands are answered by registered handlers (or `{}` when none matches),
//! events are injected with [`ScriptedSession::emit`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::CdpError;
use crate::protocol::CdpEvent;
use crate::session::ProtocolSession;

type Handler = Arc<dyn Fn(&Value) -> Result<Value, CdpError> + Send + Sync>;

/// Scripted [`ProtocolSession`].
#[derive(Default)]
pub struct ScriptedSession {
    handlers: Mutex<HashMap<String, Handler>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, Value)>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CdpEvent>>>,
    inflight: AtomicUsize,
    disconnected: AtomicBool,
    fail_reconnect: AtomicBool,
    reconnects: AtomicUsize,
}

impl ScriptedSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `method` with the handler's result.
    pub fn on<F>(&self, method: &str, handler: F)
    where
        F: Fn(&Value) -> Result<Value, CdpError> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .insert(method.to_string(), Arc::new(handler));
    }

    /// Answer `method` with a fixed value.
    pub fn respond(&self, method: &str, value: Value) {
        self.on(method, move |_| Ok(value.clone()));
    }

    /// Delay every response to `method`.
    pub fn delay(&self, method: &str, delay: Duration) {
        self.delays.lock().insert(method.to_string(), delay);
    }

    /// Push an event to every subscriber.
    pub fn emit(&self, method: &str, params: Value) {
        let event = CdpEvent::new(method, params);
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn set_inflight(&self, count: usize) {
        self.inflight.store(count, Ordering::SeqCst);
    }

    /// Simulate the transport dropping.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    pub fn fail_reconnects(&self, fail: bool) {
        self.fail_reconnect.store(fail, Ordering::SeqCst);
    }

    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Every `(method, params)` received so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }
}

#[async_trait]
impl ProtocolSession for ScriptedSession {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        let params = params.unwrap_or_else(|| json!({}));
        self.calls.lock().push((method.to_string(), params.clone()));

        if self.disconnected.load(Ordering::SeqCst) {
            return Err(CdpError::SessionClosed);
        }

        let delay = self.delays.lock().get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let handler = self.handlers.lock().get(method).cloned();
        match handler {
            Some(handler) => handler(&params),
            None => Ok(json!({})),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<CdpEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn inflight_requests(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), CdpError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_reconnect.load(Ordering::SeqCst) {
            return Err(CdpError::ConnectionFailed("scripted failure".to_string()));
        }
        self.disconnected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
