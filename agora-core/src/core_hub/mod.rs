//! The hub: channel registry, inbound-message dispatcher and worker pool.

pub mod hub;
pub mod registry;

pub use hub::{Hub, HubStopped, IncomingMessage, ROOT_CHANNEL};
pub use registry::{HubContext, Registry};
