//! Generic channel behavior shared by every channel kind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::core_channel::errors::ChannelError;
use crate::core_channel::inbox::Inbox;
use crate::core_hub::registry::HubContext;
use crate::core_protocol::messagedata::ObjectAction;
use crate::core_protocol::{
    ClientSession, ProtocolMessage, Request, SchemaKind, SessionId,
};

/// Capability interface every channel kind implements.
///
/// Channel kinds compose a shared [`BaseChannel`] rather than inheriting it;
/// a specialized `publish` delegates to [`BaseChannel::verify_publish`]
/// before any side effect.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Add a session to the subscriber set. Idempotent, never errors.
    async fn subscribe(&self, session: Arc<dyn ClientSession>);

    /// Remove a session from the subscriber set.
    async fn unsubscribe(&self, session: &SessionId) -> Result<(), ChannelError>;

    /// Apply a published message to the channel.
    async fn publish(&self, message: ProtocolMessage) -> Result<(), ChannelError>;

    /// The full message history, ordered by storage time.
    async fn catchup(&self) -> Vec<ProtocolMessage>;
}

/// Subscribers, inbox and publish verification for one channel.
pub struct BaseChannel {
    ctx: Arc<HubContext>,
    channel_id: String,
    clients: RwLock<HashMap<SessionId, Arc<dyn ClientSession>>>,
    inbox: Inbox,
    witnesses: Mutex<Vec<String>>,
}

impl BaseChannel {
    pub fn new(ctx: Arc<HubContext>, channel_id: impl Into<String>) -> Self {
        Self {
            ctx,
            channel_id: channel_id.into(),
            clients: RwLock::new(HashMap::new()),
            inbox: Inbox::new(),
            witnesses: Mutex::new(Vec::new()),
        }
    }

    /// Hierarchical path of this channel, e.g. `/root/<lao>/<election>`.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn ctx(&self) -> &Arc<HubContext> {
        &self.ctx
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Record the witness keys declared at channel creation.
    pub async fn set_witnesses(&self, witnesses: Vec<String>) {
        *self.witnesses.lock().await = witnesses;
    }

    pub async fn witnesses(&self) -> Vec<String> {
        self.witnesses.lock().await.clone()
    }

    pub async fn subscribe(&self, session: Arc<dyn ClientSession>) {
        debug!(channel = %self.channel_id, session = %session.id(), "subscribe");
        self.clients.write().await.insert(session.id(), session);
    }

    pub async fn unsubscribe(&self, session: &SessionId) -> Result<(), ChannelError> {
        debug!(channel = %self.channel_id, session = %session, "unsubscribe");
        match self.clients.write().await.remove(session) {
            Some(_) => Ok(()),
            None => Err(ChannelError::NotSubscribed),
        }
    }

    pub async fn catchup(&self) -> Vec<ProtocolMessage> {
        self.inbox.list().await
    }

    /// The channel's sole defense against replay and malformed input.
    ///
    /// In order: validate the decoded payload against the data schema,
    /// check message integrity and decode the `(object, action)` pair, then
    /// reject ids already present in the inbox. Returns the decoded payload
    /// bytes so callers parse the concrete action exactly once.
    pub async fn verify_publish(
        &self,
        message: &ProtocolMessage,
    ) -> Result<(Vec<u8>, ObjectAction), ChannelError> {
        let raw = message.decoded_data()?;
        self.ctx.validator.validate(&raw, SchemaKind::Data)?;

        message.verify()?;
        let object_action: ObjectAction = serde_json::from_slice(&raw)
            .map_err(|e| ChannelError::InvalidData(format!("failed to decode action: {e}")))?;

        if self.inbox.contains(&message.message_id).await {
            return Err(ChannelError::DuplicateMessage(message.message_id.clone()));
        }

        Ok((raw, object_action))
    }

    /// Push a broadcast envelope to every subscriber.
    ///
    /// Fire-and-forget per subscriber: one dead session is logged and must
    /// not block delivery to the others.
    pub async fn broadcast(&self, message: &ProtocolMessage) {
        let envelope = Request::broadcast(&self.channel_id, message.clone());
        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(channel = %self.channel_id, "failed to serialize broadcast: {e}");
                return;
            }
        };

        let clients = self.clients.read().await;
        for session in clients.values() {
            if let Err(e) = session.send(payload.clone()).await {
                warn!(
                    channel = %self.channel_id,
                    session = %session.id(),
                    "failed to deliver broadcast: {e}"
                );
            }
        }
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_crypto::Keypair;
    use crate::core_hub::registry::HubContext;
    use crate::core_protocol::StructuralValidator;
    use crate::test_utils::{signed_message, FakeSession};
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine;

    fn context() -> Arc<HubContext> {
        Arc::new(HubContext::new(
            Keypair::generate().public(),
            Arc::new(StructuralValidator),
        ))
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_and_unsubscribe_checked() {
        let channel = BaseChannel::new(context(), "/root/l");
        let session = FakeSession::new("s1");

        channel.subscribe(session.clone()).await;
        channel.subscribe(session.clone()).await;
        assert_eq!(channel.subscriber_count().await, 1);

        channel.unsubscribe(&session.id()).await.unwrap();
        assert!(matches!(
            channel.unsubscribe(&session.id()).await,
            Err(ChannelError::NotSubscribed)
        ));
    }

    #[tokio::test]
    async fn verify_publish_rejects_duplicates() {
        let channel = BaseChannel::new(context(), "/root/l");
        let kp = Keypair::generate();
        let msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "state"}));

        let (_, oa) = channel.verify_publish(&msg).await.unwrap();
        assert_eq!(oa.object, "lao");

        channel.inbox().store(msg.clone()).await;
        assert!(matches!(
            channel.verify_publish(&msg).await,
            Err(ChannelError::DuplicateMessage(_))
        ));
    }

    #[tokio::test]
    async fn verify_publish_rejects_schema_and_integrity_failures() {
        let channel = BaseChannel::new(context(), "/root/l");
        let kp = Keypair::generate();

        // Payload without object/action fails the data schema.
        let msg = signed_message(&kp, &serde_json::json!({"name": "x"}));
        assert!(matches!(
            channel.verify_publish(&msg).await,
            Err(ChannelError::InvalidData(_))
        ));

        // Tampered data fails the integrity check.
        let mut msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "state"}));
        msg.data = B64.encode(br#"{"object":"lao","action":"update"}"#);
        assert!(matches!(
            channel.verify_publish(&msg).await,
            Err(ChannelError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let channel = BaseChannel::new(context(), "/root/l");
        let a = FakeSession::new("a");
        let b = FakeSession::new("b");
        channel.subscribe(a.clone()).await;
        channel.subscribe(b.clone()).await;

        let kp = Keypair::generate();
        let msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "state"}));
        channel.broadcast(&msg).await;

        for session in [&a, &b] {
            let sent = session.sent_json().await;
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0]["method"], "message");
            assert_eq!(sent[0]["params"]["channel"], "/root/l");
            assert_eq!(sent[0]["params"]["message"]["message_id"], msg.message_id);
        }
    }
}
