//! Transport session seam.
//!
//! A [`ClientSession`] is the hub's handle to one connected client. The
//! transport owns the socket; the core only needs a stable identity and a
//! way to push bytes. Answer/broadcast serialization lives here so every
//! transport gets it for free via the provided methods.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::core_channel::errors::ChannelError;
use crate::core_protocol::envelope::{Answer, AnswerResult};

/// Stable identity of a connected session, usable as a set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised when pushing bytes to a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}

/// The hub's view of a connected client.
#[async_trait]
pub trait ClientSession: Send + Sync {
    /// Stable session identity.
    fn id(&self) -> SessionId;

    /// Push a serialized payload to the client.
    async fn send(&self, payload: Vec<u8>) -> Result<(), SessionError>;

    /// Answer a query with an error. Best-effort: a dead session is logged,
    /// never propagated.
    async fn send_error(&self, id: Option<i64>, error: &ChannelError) {
        let answer = Answer::error(id, error.error_code(), error.to_string());
        self.send_answer(&answer).await;
    }

    /// Answer a query with a result. Best-effort, like `send_error`.
    async fn send_result(&self, id: i64, result: AnswerResult) {
        let answer = Answer::result(id, result);
        self.send_answer(&answer).await;
    }

    async fn send_answer(&self, answer: &Answer) {
        let payload = match serde_json::to_vec(answer) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(session = %self.id(), "failed to serialize answer: {e}");
                return;
            }
        };
        if let Err(e) = self.send(payload).await {
            warn!(session = %self.id(), "failed to deliver answer: {e}");
        }
    }
}
