//! In-flight network request bookkeeping.

use std::collections::HashSet;

use crate::protocol::CdpEvent;

/// Tracks page requests between `Network.requestWillBeSent` and their
/// `loadingFinished`/`loadingFailed` counterpart.
#[derive(Debug, Default)]
pub struct InflightTracker {
    requests: HashSet<String>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the set from one event. Non-network events are ignored.
    pub fn observe(&mut self, event: &CdpEvent) {
        let Some(request_id) = event.params.get("requestId").and_then(|v| v.as_str()) else {
            return;
        };
        match event.method.as_str() {
            // Redirects reuse the request id, so the set stays at one entry.
            "Network.requestWillBeSent" => {
                self.requests.insert(request_id.to_string());
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                self.requests.remove(request_id);
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(method: &str, id: &str) -> CdpEvent {
        CdpEvent::new(method, json!({"requestId": id}))
    }

    #[test]
    fn test_request_lifecycle() {
        let mut tracker = InflightTracker::new();
        tracker.observe(&event("Network.requestWillBeSent", "1"));
        tracker.observe(&event("Network.requestWillBeSent", "2"));
        assert_eq!(tracker.len(), 2);

        tracker.observe(&event("Network.loadingFinished", "1"));
        tracker.observe(&event("Network.loadingFailed", "2"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_redirect_keeps_single_entry() {
        let mut tracker = InflightTracker::new();
        tracker.observe(&event("Network.requestWillBeSent", "1"));
        tracker.observe(&event("Network.requestWillBeSent", "1"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_unrelated_events_ignored() {
        let mut tracker = InflightTracker::new();
        tracker.observe(&event("Network.responseReceived", "1"));
        tracker.observe(&CdpEvent::new("Page.loadEventFired", json!({})));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_finish_of_unknown_request() {
        let mut tracker = InflightTracker::new();
        tracker.observe(&event("Network.loadingFinished", "42"));
        assert_eq!(tracker.len(), 0);
    }
}
