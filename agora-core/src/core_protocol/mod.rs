//! Wire protocol types and boundary traits.
//!
//! The hub speaks a JSON-RPC style protocol: queries (`subscribe`,
//! `unsubscribe`, `publish`, `catchup`) target a channel, answers carry a
//! result or a numeric error code, and `message` envelopes fan published
//! messages out to subscribers. Transport and schema validation are
//! collaborators behind the [`session::ClientSession`] and
//! [`validation::SchemaValidator`] traits.

pub mod envelope;
pub mod messagedata;
pub mod session;
pub mod validation;

pub use envelope::{
    Answer, AnswerResult, BroadcastParams, ChannelParams, ErrorAnswer, ProtocolMessage,
    PublishParams, Query, Request, WitnessSignature, JSON_RPC_VERSION,
};
pub use messagedata::{
    CastVote, CastVoteEntry, CreateLao, ElectionSetup, ElectionSetupQuestion, ObjectAction,
    RollCallClose, VotingMethod,
};
pub use session::{ClientSession, SessionError, SessionId};
pub use validation::{SchemaKind, SchemaValidator, StructuralValidator, ValidationError};
