//! Channel layer: the per-channel state machines the hub dispatches into.
//!
//! Every channel kind composes a [`base::BaseChannel`] (subscribers, inbox,
//! publish verification, broadcast) and adds its own publish semantics:
//! [`lao::LaoChannel`] for top-level organizations and
//! [`election::ElectionChannel`] for the voting state machine.

pub mod attendees;
pub mod base;
pub mod election;
pub mod errors;
pub mod inbox;
pub mod lao;

pub use attendees::Attendees;
pub use base::{BaseChannel, Channel};
pub use election::ElectionChannel;
pub use errors::ChannelError;
pub use inbox::Inbox;
pub use lao::LaoChannel;
