//! Agora core — the hub of a federated event-log protocol.
//!
//! Clients publish signed, append-only messages into hierarchical channels
//! (one per LAO and per LAO sub-resource such as an election); the hub fans
//! them out to subscribed sessions and replays history to late joiners.
//!
//! The crate is organized leaves-first:
//!
//! - [`core_crypto`] — ed25519 keys, signatures, content-derived message ids
//! - [`core_protocol`] — JSON-RPC envelope, message payloads, session trait
//! - [`core_channel`] — attendee set, inbox, base/LAO/election channels
//! - [`core_hub`] — channel registry, dispatcher, bounded worker pool
//!
//! Wire transport, JSON-schema validation and key management live outside
//! the core and reach it through the narrow traits in [`core_protocol`].

pub mod config;
pub mod core_channel;
pub mod core_crypto;
pub mod core_hub;
pub mod core_protocol;
pub mod logging;
pub mod test_utils;

pub use config::{Config, HubConfig};
pub use core_channel::errors::ChannelError;
pub use core_hub::hub::Hub;
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
