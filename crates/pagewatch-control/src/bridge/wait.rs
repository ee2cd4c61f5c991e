//! Bounded waits.

use std::future::Future;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;

use crate::error::ControlError;
use crate::request::{NetworkIdleParams, WaitForElementParams};

use super::ControlBridge;

/// The time budget of one action.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    pub(crate) fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub(crate) fn at(&self) -> Instant {
        self.at
    }

    pub(crate) fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }

    pub(crate) fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub(crate) fn timeout(&self, waiting_for: impl Into<String>) -> ControlError {
        ControlError::Timeout {
            waiting_for: waiting_for.into(),
            timeout_ms: self.budget_ms(),
        }
    }
}

/// Run `check` every `interval` until it yields a value or the deadline
/// passes. `Ok(None)` means the deadline passed; the caller decides which
/// error that is.
///
/// The check is always run at least once, and once more at the deadline.
pub(crate) async fn poll_until<T, F, Fut>(
    deadline: Deadline,
    interval: Duration,
    mut check: F,
) -> Result<Option<T>, ControlError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ControlError>>,
{
    loop {
        match check().await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(ControlError::Timeout { .. }) if deadline.expired() => return Ok(None),
            Err(e) => return Err(e),
        }
        if deadline.expired() {
            return Ok(None);
        }
        let next = (Instant::now() + interval).min(deadline.at);
        tokio::time::sleep_until(next).await;
    }
}

impl ControlBridge {
    pub(super) async fn wait_for_element(
        &self,
        deadline: &Deadline,
        params: &WaitForElementParams,
    ) -> Result<Value, ControlError> {
        let selector = params.selector.as_str();
        let visible = params.visible;

        let found = poll_until(*deadline, self.config.poll_interval, || async move {
            let Some(node_id) = self.query(deadline, selector).await? else {
                return Ok(None);
            };
            if visible && !self.is_visible(deadline, node_id).await? {
                return Ok(None);
            }
            Ok(Some(node_id))
        })
        .await?;

        match found {
            Some(node_id) => Ok(json!({
                "selector": selector,
                "found": true,
                "visible": visible,
                "nodeId": node_id,
            })),
            None if visible => Err(deadline.timeout(format!("'{}' to become visible", selector))),
            None => Err(deadline.timeout(format!("element '{}'", selector))),
        }
    }

    /// Succeeds once the session's in-flight request count has stayed at
    /// zero for the idle time.
    pub(super) async fn wait_for_network_idle(
        &self,
        deadline: &Deadline,
        params: &NetworkIdleParams,
    ) -> Result<Value, ControlError> {
        let idle_time = params
            .idle_time
            .map(Duration::from_millis)
            .unwrap_or(self.config.network_idle);
        let started = Instant::now();
        let mut idle_since: Option<Instant> = None;

        loop {
            let now = Instant::now();
            if self.session.inflight_requests() == 0 {
                let since = *idle_since.get_or_insert(now);
                if now - since >= idle_time {
                    return Ok(json!({
                        "idleTime": idle_time.as_millis() as u64,
                        "waited": (now - started).as_millis() as u64,
                    }));
                }
            } else {
                idle_since = None;
            }

            if deadline.expired() {
                return Err(deadline.timeout(format!(
                    "network idle for {}ms ({} requests in flight)",
                    idle_time.as_millis(),
                    self.session.inflight_requests()
                )));
            }

            let mut next = now + self.config.poll_interval;
            if let Some(since) = idle_since {
                next = next.min(since + idle_time);
            }
            tokio::time::sleep_until(next.min(deadline.at)).await;
        }
    }
}
