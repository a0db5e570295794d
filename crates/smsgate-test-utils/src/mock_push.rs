// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock push transport for deterministic testing.
//!
//! `MockPushClient` implements `PushClient`, captures every batch it is
//! asked to send and can be told to reject individual addresses or fail
//! as a whole.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use smsgate_core::{GatewayError, PushClient, PushEvent, PushOutcome};

/// A push transport that records instead of sending.
pub struct MockPushClient {
    batches: Mutex<Vec<HashMap<String, PushEvent>>>,
    failing: Mutex<HashSet<String>>,
    transport_down: AtomicBool,
}

impl MockPushClient {
    /// Create a mock transport that accepts everything.
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            transport_down: AtomicBool::new(false),
        }
    }

    /// Reject `address` on every send until [`MockPushClient::accept_address`].
    pub fn fail_address(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn accept_address(&self, address: &str) {
        self.failing.lock().unwrap().remove(address);
    }

    /// Make every send fail as a whole (nothing delivered).
    pub fn set_transport_down(&self, down: bool) {
        self.transport_down.store(down, Ordering::SeqCst);
    }

    /// All batches passed to `send()`, oldest first.
    pub fn batches(&self) -> Vec<HashMap<String, PushEvent>> {
        self.batches.lock().unwrap().clone()
    }

    /// Number of `send()` calls.
    pub fn send_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Every event sent to `address`, oldest first.
    pub fn events_for(&self, address: &str) -> Vec<PushEvent> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .filter_map(|batch| batch.get(address).cloned())
            .collect()
    }

    pub fn clear(&self) {
        self.batches.lock().unwrap().clear();
    }
}

impl Default for MockPushClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushClient for MockPushClient {
    fn name(&self) -> &str {
        "mock-push"
    }

    async fn send(
        &self,
        batch: &HashMap<String, PushEvent>,
    ) -> Result<PushOutcome, GatewayError> {
        self.batches.lock().unwrap().push(batch.clone());

        if self.transport_down.load(Ordering::SeqCst) {
            return Err(GatewayError::push("mock transport down"));
        }

        let failing = self.failing.lock().unwrap();
        Ok(batch
            .keys()
            .filter(|address| failing.contains(*address))
            .map(|address| (address.clone(), GatewayError::push("mock rejected address")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(addresses: &[&str]) -> HashMap<String, PushEvent> {
        addresses
            .iter()
            .map(|a| (a.to_string(), PushEvent::message_enqueued()))
            .collect()
    }

    #[tokio::test]
    async fn records_batches() {
        let client = MockPushClient::new();
        client.send(&batch(&["a", "b"])).await.unwrap();
        assert_eq!(client.send_count(), 1);
        assert_eq!(client.events_for("a").len(), 1);
        assert!(client.events_for("c").is_empty());
    }

    #[tokio::test]
    async fn rejects_configured_addresses() {
        let client = MockPushClient::new();
        client.fail_address("b");
        let outcome = client.send(&batch(&["a", "b"])).await.unwrap();
        assert_eq!(outcome.keys().collect::<Vec<_>>(), vec!["b"]);

        client.accept_address("b");
        assert!(client.send(&batch(&["b"])).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_down_fails_whole_batch() {
        let client = MockPushClient::new();
        client.set_transport_down(true);
        assert!(client.send(&batch(&["a"])).await.is_err());
        assert_eq!(client.send_count(), 1);
    }
}
