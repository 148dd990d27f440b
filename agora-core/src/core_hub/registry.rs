//! Channel registry and the shared hub context.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core_channel::base::Channel;
use crate::core_channel::errors::ChannelError;
use crate::core_crypto::PublicKey;
use crate::core_protocol::SchemaValidator;

/// State shared between the hub and every channel it owns: the registry
/// (channels register their own sub-channels, e.g. elections), the hub's
/// organizer identity, and the schema-validation collaborator.
pub struct HubContext {
    registry: Registry,
    organizer: PublicKey,
    pub validator: Arc<dyn SchemaValidator>,
}

impl HubContext {
    pub fn new(organizer: PublicKey, validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            registry: Registry::new(),
            organizer,
            validator,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The hub's own public key; the organizer may always vote.
    pub fn organizer(&self) -> &PublicKey {
        &self.organizer
    }
}

/// Process-wide map from channel path to channel.
///
/// A channel, once registered under a path, is never replaced or removed;
/// registration of a colliding path fails instead of overwriting.
#[derive(Default)]
pub struct Registry {
    channels: RwLock<HashMap<String, Arc<dyn Channel>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its path, failing on collision.
    pub async fn register(
        &self,
        path: &str,
        channel: Arc<dyn Channel>,
    ) -> Result<(), ChannelError> {
        let mut channels = self.channels.write().await;
        if channels.contains_key(path) {
            return Err(ChannelError::DuplicateChannel(path.to_string()));
        }
        channels.insert(path.to_string(), channel);
        Ok(())
    }

    /// Look up a channel by its full path.
    pub async fn get(&self, path: &str) -> Option<Arc<dyn Channel>> {
        self.channels.read().await.get(path).cloned()
    }

    /// Snapshot of every registered channel, for whole-hub sweeps.
    pub async fn all(&self) -> Vec<Arc<dyn Channel>> {
        self.channels.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_channel::base::BaseChannel;
    use crate::core_channel::lao::LaoChannel;
    use crate::core_crypto::Keypair;
    use crate::core_protocol::StructuralValidator;

    fn context() -> Arc<HubContext> {
        Arc::new(HubContext::new(
            Keypair::generate().public(),
            Arc::new(StructuralValidator),
        ))
    }

    #[tokio::test]
    async fn register_once_then_collide() {
        let ctx = context();
        let registry = ctx.registry();

        let channel: Arc<dyn Channel> =
            Arc::new(LaoChannel::new(BaseChannel::new(Arc::clone(&ctx), "/root/a")));
        registry.register("/root/a", channel).await.unwrap();
        assert_eq!(registry.len().await, 1);

        let other: Arc<dyn Channel> =
            Arc::new(LaoChannel::new(BaseChannel::new(Arc::clone(&ctx), "/root/a")));
        assert!(matches!(
            registry.register("/root/a", other).await,
            Err(ChannelError::DuplicateChannel(_))
        ));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn lookup_by_path() {
        let ctx = context();
        let registry = ctx.registry();
        assert!(registry.get("/root/missing").await.is_none());

        let channel: Arc<dyn Channel> =
            Arc::new(LaoChannel::new(BaseChannel::new(Arc::clone(&ctx), "/root/b")));
        registry.register("/root/b", channel).await.unwrap();
        assert!(registry.get("/root/b").await.is_some());
        assert_eq!(registry.all().await.len(), 1);
    }
}
