//! Test fixtures shared by unit and integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use tokio::sync::{Mutex, Semaphore};

use crate::core_crypto::{self, Keypair};
use crate::core_protocol::{ClientSession, ProtocolMessage, SessionError, SessionId};

/// Build a correctly signed message carrying `payload` as its data.
pub fn signed_message(kp: &Keypair, payload: &serde_json::Value) -> ProtocolMessage {
    let data = B64.encode(serde_json::to_vec(payload).expect("payload serializes"));
    let signature = kp.sign(data.as_bytes());
    ProtocolMessage {
        message_id: core_crypto::message_id(&data, &signature),
        sender: kp.public().to_base64(),
        data,
        signature,
        witness_signatures: Vec::new(),
    }
}

/// An in-memory session that records every payload sent to it.
///
/// When built with [`FakeSession::gated`], each `send` first waits for a
/// permit, letting tests park workers deliberately.
pub struct FakeSession {
    id: SessionId,
    pub sent: Mutex<Vec<Vec<u8>>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSession {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId(id.to_string()),
            sent: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    pub fn gated(id: &str, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId(id.to_string()),
            sent: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    /// Everything sent so far, parsed as JSON.
    pub async fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|raw| serde_json::from_slice(raw).expect("session payloads are JSON"))
            .collect()
    }
}

#[async_trait]
impl ClientSession for FakeSession {
    fn id(&self) -> SessionId {
        self.id.clone()
    }

    async fn send(&self, payload: Vec<u8>) -> Result<(), SessionError> {
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| SessionError::Closed)?;
            permit.forget();
        }
        self.sent.lock().await.push(payload);
        Ok(())
    }
}
