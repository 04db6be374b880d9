//! In-memory transport implementation for testing and local simulation

use super::{
    SIGNING_REQUEST_TOPIC, SIGNING_RESULT_ERROR_TOPIC, SIGNING_RESULT_TOPIC, Transport,
    async_trait,
};
use crate::{Error, Result, SignRoundRequest, SigningResponse, SigningResultErrorEvent};
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// In-memory message transport
///
/// Every outbound message is stored as JSON under its topic, and every
/// dispatch is also pushed to subscribers so simulated signer parties can
/// react to it. Useful for:
/// - Unit and integration testing
/// - Single-process simulation of a signer quorum
#[derive(Debug)]
pub struct MemoryTransport {
    /// Published messages: topic -> Vec<message_bytes>
    topics: Arc<DashMap<String, Vec<Vec<u8>>>>,
    /// Notification channel for new messages on any topic
    notify: broadcast::Sender<()>,
    /// Dispatch fan-out to simulated parties
    dispatches: broadcast::Sender<SignRoundRequest>,
    /// Number of upcoming dispatches to fail
    failing_dispatches: Arc<AtomicUsize>,
    /// Timeout for waiting on messages (milliseconds)
    timeout_ms: u64,
}

impl MemoryTransport {
    /// Create a new in-memory transport with default timeout
    pub fn new() -> Self {
        Self::with_timeout(30_000) // 30 seconds default
    }

    /// Create a new in-memory transport with custom timeout
    pub fn with_timeout(timeout_ms: u64) -> Self {
        let (notify, _) = broadcast::channel(1000);
        let (dispatches, _) = broadcast::channel(1000);
        Self {
            topics: Arc::new(DashMap::new()),
            notify,
            dispatches,
            failing_dispatches: Arc::new(AtomicUsize::new(0)),
            timeout_ms,
        }
    }

    /// Bound the dispatch fan-out; subscribers further behind than this lag
    ///
    /// Call before subscribing.
    pub fn with_dispatch_capacity(mut self, capacity: usize) -> Self {
        let (dispatches, _) = broadcast::channel(capacity.max(1));
        self.dispatches = dispatches;
        self
    }

    /// Receive every subsequent dispatch
    pub fn subscribe_dispatches(&self) -> broadcast::Receiver<SignRoundRequest> {
        self.dispatches.subscribe()
    }

    /// Make the next `count` dispatches fail with a transport error
    pub fn fail_next_dispatches(&self, count: usize) {
        self.failing_dispatches.store(count, Ordering::SeqCst);
    }

    /// Get the number of messages published on a topic
    pub fn message_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|v| v.len()).unwrap_or(0)
    }

    /// Decode every message published on a topic
    pub fn messages<T: DeserializeOwned>(&self, topic: &str) -> Result<Vec<T>> {
        match self.topics.get(topic) {
            Some(messages) => messages.iter().map(|bytes| deserialize(bytes)).collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Wait until `count` messages are on `topic` and decode them
    pub async fn collect<T: DeserializeOwned>(&self, topic: &str, count: usize) -> Result<Vec<T>> {
        let mut rx = self.notify.subscribe();
        let deadline = Instant::now() + Duration::from_millis(self.timeout_ms);

        loop {
            // Check if we have enough messages
            if let Some(messages) = self.topics.get(topic) {
                if messages.len() >= count {
                    return messages
                        .iter()
                        .take(count)
                        .map(|bytes| deserialize(bytes))
                        .collect();
                }
            }

            // Check timeout
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(format!(
                    "{count} messages on topic {topic}"
                )));
            }

            // Wait for notification or timeout
            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(Duration::from_millis(100).min(remaining)) => continue,
            }
        }
    }

    /// Clear all messages (useful for test cleanup)
    pub fn clear(&self) {
        self.topics.clear();
    }

    fn publish<T: Serialize>(&self, topic: &str, message: &T) -> Result<()> {
        let bytes = serialize(message)?;
        self.topics.entry(topic.to_string()).or_default().push(bytes);

        // Notify waiting collectors
        let _ = self.notify.send(());
        Ok(())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_dispatches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryTransport {
    fn clone(&self) -> Self {
        Self {
            topics: Arc::clone(&self.topics),
            notify: self.notify.clone(),
            dispatches: self.dispatches.clone(),
            failing_dispatches: Arc::clone(&self.failing_dispatches),
            timeout_ms: self.timeout_ms,
        }
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn dispatch(&self, request: &SignRoundRequest) -> Result<()> {
        if self.take_injected_failure() {
            return Err(Error::Transport(format!(
                "injected failure for round {}",
                request.round
            )));
        }

        self.publish(SIGNING_REQUEST_TOPIC, request)?;
        // No subscribers is fine, parties may be driven by hand
        let _ = self.dispatches.send(request.clone());
        debug!(
            fingerprint = %request.fingerprint,
            round = request.round,
            "Dispatched signing round"
        );
        Ok(())
    }

    async fn publish_response(&self, response: &SigningResponse) -> Result<()> {
        self.publish(SIGNING_RESULT_TOPIC, response)
    }

    async fn publish_error_event(&self, event: &SigningResultErrorEvent) -> Result<()> {
        self.publish(SIGNING_RESULT_ERROR_TOPIC, event)
    }
}
