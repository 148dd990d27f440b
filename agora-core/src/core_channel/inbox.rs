//! Per-channel message store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use crate::core_protocol::ProtocolMessage;

/// A message plus its storage stamp.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message: ProtocolMessage,
    /// Wall-clock nanoseconds at insertion.
    pub stored_at: i64,
    /// Per-inbox insertion counter; breaks `stored_at` ties so the catchup
    /// order is total and stable within one process run.
    seq: u64,
}

/// Ordered, deduplicated store of every message a channel accepted.
///
/// Keyed by message id; insertion order is recovered at read time from the
/// `(stored_at, seq)` stamp. Duplicate rejection is the publisher's job
/// (`verify_publish` runs before `store` is reached), so `store` itself
/// overwrites nothing it should not see.
#[derive(Debug, Default)]
pub struct Inbox {
    store: RwLock<HashMap<String, StoredMessage>>,
    seq: AtomicU64,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message, stamping it with the current time.
    pub async fn store(&self, message: ProtocolMessage) {
        let stored_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = message.message_id.clone();
        self.store.write().await.insert(
            id,
            StoredMessage {
                message,
                stored_at,
                seq,
            },
        );
    }

    /// Whether a message with this id was already accepted.
    pub async fn contains(&self, message_id: &str) -> bool {
        self.store.read().await.contains_key(message_id)
    }

    /// All stored messages, ordered by storage time.
    pub async fn list(&self) -> Vec<ProtocolMessage> {
        let store = self.store.read().await;
        let mut stored: Vec<&StoredMessage> = store.values().collect();
        stored.sort_by_key(|m| (m.stored_at, m.seq));
        stored.into_iter().map(|m| m.message.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}
