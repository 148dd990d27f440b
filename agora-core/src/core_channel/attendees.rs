//! The attendee set of a LAO and its elections.

use std::collections::HashSet;

use tokio::sync::Mutex;

/// Thread-safe, append-only set of attendee identities (base64 public keys).
///
/// A LAO and its election channels share one `Attendees` value behind an
/// `Arc`, so attendees added by a roll-call after an election's setup are
/// still visible to the election's authorization check.
#[derive(Debug, Default)]
pub struct Attendees {
    members: Mutex<HashSet<String>>,
}

impl Attendees {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an identity. Idempotent.
    pub async fn add(&self, identity: &str) {
        self.members.lock().await.insert(identity.to_string());
    }

    /// Whether an identity is in the set.
    pub async fn is_present(&self, identity: &str) -> bool {
        self.members.lock().await.contains(identity)
    }

    /// Deep snapshot, detached from later mutations of `self`.
    pub async fn copy(&self) -> Attendees {
        let members = self.members.lock().await.clone();
        Attendees {
            members: Mutex::new(members),
        }
    }
}
