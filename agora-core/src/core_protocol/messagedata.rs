//! Decoded message payloads.
//!
//! Every message's `data` field decodes to a JSON object carrying `object`
//! and `action` discriminators plus action-specific fields. [`ObjectAction`]
//! is the cheap first-pass peek; the concrete payload types below are parsed
//! once the pair is known. Unknown fields are ignored so newer clients stay
//! compatible.

use serde::{Deserialize, Serialize};

/// The `(object, action)` discriminator pair present in every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectAction {
    pub object: String,
    pub action: String,
}

/// `lao#create` — the only publish accepted on the root channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLao {
    /// Base64 id of the LAO; becomes the channel path suffix.
    pub id: String,
    pub name: String,
    pub creation: i64,
    /// Base64 public key of the organizer.
    pub organizer: String,
    #[serde(default)]
    pub witnesses: Vec<String>,
}

/// `election#setup` — published on a LAO channel to open an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSetup {
    /// Base64 id of the election; becomes the sub-channel path suffix.
    pub id: String,
    /// Id of the LAO this election belongs to; must match the channel.
    pub lao: String,
    pub name: String,
    pub created_at: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub questions: Vec<ElectionSetupQuestion>,
}

/// One question of an election setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSetupQuestion {
    pub id: String,
    pub question: String,
    pub voting_method: VotingMethod,
    pub ballot_options: Vec<String>,
    #[serde(default)]
    pub write_in: bool,
}

/// Supported voting methods, with their wire spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingMethod {
    Plurality,
    Approval,
}

/// `election#cast_vote` — a sender's selections for one or more questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    pub lao: String,
    pub election: String,
    pub created_at: i64,
    pub votes: Vec<CastVoteEntry>,
}

/// Selections for a single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteEntry {
    /// Id of the question being answered.
    pub id: String,
    /// Indexes into the question's ballot options.
    pub vote: Vec<usize>,
}

/// `roll_call#close` — delivers the final attendee list to the LAO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollCallClose {
    pub update_id: String,
    pub closes: String,
    pub closed_at: i64,
    #[serde(default)]
    pub attendees: Vec<String>,
}
