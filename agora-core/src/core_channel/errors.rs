//! Channel and dispatch errors, with their wire error codes.

use thiserror::Error;

use crate::core_protocol::messagedata::VotingMethod;
use crate::core_protocol::validation::ValidationError;

/// Everything that can go wrong while routing or applying a query.
///
/// Each variant maps to one of the protocol's numeric codes via
/// [`ChannelError::error_code`]; the dispatcher is the only place that turns
/// a variant into a wire answer.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Method not allowed on the targeted channel. Code -1.
    #[error("invalid method for this channel: {0}")]
    InvalidMethod(String),

    /// Payload action not recognized by the channel. Code -1.
    #[error("unrecognized action: {0}")]
    InvalidAction(String),

    /// Action recognized but deliberately unimplemented. Code -1.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// No channel registered under the given path. Code -2.
    #[error("channel {0} does not exist")]
    UnknownChannel(String),

    /// Unsubscribe from a channel the session never joined. Code -2.
    #[error("session is not subscribed to this channel")]
    NotSubscribed,

    /// A message with this id is already in the inbox. Code -3.
    #[error("message {0} already exists in this channel")]
    DuplicateMessage(String),

    /// A channel is already registered under this path. Code -3.
    #[error("channel {0} already exists")]
    DuplicateChannel(String),

    /// Malformed envelope, schema mismatch or failed integrity check. Code -4.
    #[error("invalid message data: {0}")]
    InvalidData(String),

    /// Election setup whose `lao` field disagrees with the channel. Code -4.
    #[error("lao id {lao} does not match channel {channel}")]
    ChannelMismatch { lao: String, channel: String },

    /// Vote created after the election's end time. Code -4.
    #[error("vote cast at {cast_at} but the election ended at {ended_at}")]
    VoteTooLate { cast_at: i64, ended_at: i64 },

    /// Sender field does not parse as an ed25519 key. Code -4.
    #[error("invalid sender public key")]
    InvalidSenderKey,

    /// Sender is neither an attendee nor the organizer. Code -4.
    #[error("only attendees and the organizer may cast a vote")]
    UnauthorizedVoter,

    /// Vote references a question the election does not have. Code -4.
    #[error("no question with id {0}")]
    UnknownQuestion(String),

    /// Selection count not allowed by the voting method. Code -4.
    #[error("{method:?} voting does not allow {got} selected options")]
    InvalidVoteShape { method: VotingMethod, got: usize },
}

impl ChannelError {
    /// The numeric code carried in the wire-level error answer.
    pub fn error_code(&self) -> i64 {
        use ChannelError::*;
        match self {
            InvalidMethod(_) | InvalidAction(_) | NotImplemented(_) => -1,
            UnknownChannel(_) | NotSubscribed => -2,
            DuplicateMessage(_) | DuplicateChannel(_) => -3,
            InvalidData(_)
            | ChannelMismatch { .. }
            | VoteTooLate { .. }
            | InvalidSenderKey
            | UnauthorizedVoter
            | UnknownQuestion(_)
            | InvalidVoteShape { .. } => -4,
        }
    }
}

impl From<ValidationError> for ChannelError {
    fn from(e: ValidationError) -> Self {
        ChannelError::InvalidData(e.to_string())
    }
}
