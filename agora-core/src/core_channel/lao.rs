//! LAO channels: the top-level organizational channel kind.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core_channel::attendees::Attendees;
use crate::core_channel::base::{BaseChannel, Channel};
use crate::core_channel::election::ElectionChannel;
use crate::core_channel::errors::ChannelError;
use crate::core_protocol::messagedata::{ElectionSetup, RollCallClose};
use crate::core_protocol::{ClientSession, ProtocolMessage, SessionId};

/// A top-level channel created through the root channel.
///
/// Owns the attendee set its elections authorize against; elections hold the
/// same `Arc`, so a roll-call closed after an election's setup still adds
/// eligible voters.
pub struct LaoChannel {
    base: BaseChannel,
    attendees: Arc<Attendees>,
}

impl LaoChannel {
    pub fn new(base: BaseChannel) -> Self {
        Self {
            base,
            attendees: Arc::new(Attendees::new()),
        }
    }

    pub fn base(&self) -> &BaseChannel {
        &self.base
    }

    pub fn attendees(&self) -> &Arc<Attendees> {
        &self.attendees
    }

    /// Open an election as a sub-channel of this LAO.
    ///
    /// The creation message is stored in both the LAO inbox and the new
    /// election inbox, so the election is replayable from its own channel
    /// alone.
    async fn create_election(
        &self,
        message: ProtocolMessage,
        setup: ElectionSetup,
    ) -> Result<(), ChannelError> {
        let channel_id = self.base.channel_id();
        let lao_id = channel_id.strip_prefix("/root/").unwrap_or(channel_id);
        if lao_id != setup.lao {
            return Err(ChannelError::ChannelMismatch {
                lao: setup.lao,
                channel: channel_id.to_string(),
            });
        }

        let election_path = format!("{}/{}", channel_id, setup.id);
        let election = ElectionChannel::new(
            BaseChannel::new(Arc::clone(self.base.ctx()), election_path.clone()),
            &setup,
            Arc::clone(&self.attendees),
        );
        election.base().inbox().store(message.clone()).await;

        self.base
            .ctx()
            .registry()
            .register(&election_path, Arc::new(election))
            .await?;
        self.base.inbox().store(message).await;

        info!(lao = %channel_id, election = %election_path, "election created");
        Ok(())
    }

    /// Merge the closed roll-call's attendee list into the shared set.
    async fn close_roll_call(&self, close: RollCallClose) {
        for attendee in &close.attendees {
            self.attendees.add(attendee).await;
        }
        debug!(
            channel = %self.base.channel_id(),
            count = close.attendees.len(),
            "roll call closed"
        );
    }
}

#[async_trait]
impl Channel for LaoChannel {
    async fn subscribe(&self, session: Arc<dyn ClientSession>) {
        self.base.subscribe(session).await;
    }

    async fn unsubscribe(&self, session: &SessionId) -> Result<(), ChannelError> {
        self.base.unsubscribe(session).await
    }

    async fn publish(&self, message: ProtocolMessage) -> Result<(), ChannelError> {
        let (raw, object_action) = self.base.verify_publish(&message).await?;

        match (object_action.object.as_str(), object_action.action.as_str()) {
            ("election", "setup") => {
                let setup: ElectionSetup = serde_json::from_slice(&raw)
                    .map_err(|e| ChannelError::InvalidData(format!("election setup: {e}")))?;
                self.create_election(message, setup).await
            }
            ("roll_call", "close") => {
                let close: RollCallClose = serde_json::from_slice(&raw)
                    .map_err(|e| ChannelError::InvalidData(format!("roll call close: {e}")))?;
                self.close_roll_call(close).await;
                self.base.inbox().store(message.clone()).await;
                self.base.broadcast(&message).await;
                Ok(())
            }
            // Plain event messages: store and fan out unchanged.
            ("lao", _) | ("meeting", _) | ("roll_call", _) => {
                self.base.inbox().store(message.clone()).await;
                self.base.broadcast(&message).await;
                Ok(())
            }
            (object, action) => Err(ChannelError::InvalidAction(format!("{object}#{action}"))),
        }
    }

    async fn catchup(&self) -> Vec<ProtocolMessage> {
        self.base.catchup().await
    }
}
