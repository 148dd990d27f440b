//! JSON-RPC envelope types.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::core_crypto::{self, PublicKey};
use crate::core_protocol::validation::ValidationError;

/// Protocol version stamped on every request and answer.
pub const JSON_RPC_VERSION: &str = "2.0";

/// An inbound or outbound request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub query: Query,
}

impl Request {
    /// Build the broadcast envelope pushed to subscribers of `channel`.
    pub fn broadcast(channel: &str, message: ProtocolMessage) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            query: Query::Broadcast {
                params: BroadcastParams {
                    channel: channel.to_string(),
                    message,
                },
            },
        }
    }
}

/// The query part of a request, tagged by its JSON-RPC method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Query {
    #[serde(rename = "subscribe")]
    Subscribe { id: i64, params: ChannelParams },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { id: i64, params: ChannelParams },
    #[serde(rename = "publish")]
    Publish { id: i64, params: PublishParams },
    #[serde(rename = "catchup")]
    Catchup { id: i64, params: ChannelParams },
    /// Server-to-client fanout; carries no request id.
    #[serde(rename = "message")]
    Broadcast { params: BroadcastParams },
}

impl Query {
    /// The channel this query targets.
    pub fn channel(&self) -> &str {
        match self {
            Query::Subscribe { params, .. } | Query::Unsubscribe { params, .. } => &params.channel,
            Query::Catchup { params, .. } => &params.channel,
            Query::Publish { params, .. } => &params.channel,
            Query::Broadcast { params } => &params.channel,
        }
    }

    /// The request id, if this query expects an answer.
    pub fn id(&self) -> Option<i64> {
        match self {
            Query::Subscribe { id, .. }
            | Query::Unsubscribe { id, .. }
            | Query::Publish { id, .. }
            | Query::Catchup { id, .. } => Some(*id),
            Query::Broadcast { .. } => None,
        }
    }
}

/// Parameters of subscribe/unsubscribe/catchup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelParams {
    pub channel: String,
}

/// Parameters of publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishParams {
    pub channel: String,
    pub message: ProtocolMessage,
}

/// Parameters of the broadcast (`message`) envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastParams {
    pub channel: String,
    pub message: ProtocolMessage,
}

/// A signed, append-only protocol message.
///
/// `data` is the base64-encoded payload, `signature` the sender's ed25519
/// signature over that base64 string, and `message_id` the content hash of
/// the two. Immutable once stored in a channel inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub message_id: String,
    pub sender: String,
    pub data: String,
    pub signature: String,
    #[serde(default)]
    pub witness_signatures: Vec<WitnessSignature>,
}

/// A co-signature by a witness; stored verbatim, never interpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessSignature {
    pub witness: String,
    pub signature: String,
}

impl ProtocolMessage {
    /// Decode the base64 payload into raw JSON bytes.
    pub fn decoded_data(&self) -> Result<Vec<u8>, ValidationError> {
        B64.decode(&self.data)
            .map_err(|e| ValidationError::Integrity(format!("data is not valid base64: {e}")))
    }

    /// Check sender key, signature and content-derived id.
    pub fn verify(&self) -> Result<(), ValidationError> {
        let sender = PublicKey::from_base64(&self.sender)
            .map_err(|e| ValidationError::Integrity(format!("sender key: {e}")))?;
        sender
            .verify(self.data.as_bytes(), &self.signature)
            .map_err(|e| ValidationError::Integrity(format!("signature: {e}")))?;

        let expected = core_crypto::message_id(&self.data, &self.signature);
        if self.message_id != expected {
            return Err(ValidationError::Integrity(
                "message_id does not match content hash".to_string(),
            ));
        }
        Ok(())
    }
}

/// An answer to a query: exactly one of `result` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub jsonrpc: String,
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnswerResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorAnswer>,
}

impl Answer {
    pub fn result(id: i64, result: AnswerResult) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<i64>, code: i64, description: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(ErrorAnswer {
                code,
                description: description.into(),
            }),
        }
    }
}

/// Result payload of a successful answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerResult {
    /// Ack for subscribe/unsubscribe/publish: always `0`.
    General(i64),
    /// Catchup: the channel history in storage order.
    Messages(Vec<ProtocolMessage>),
}

/// The error payload of a failed answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAnswer {
    pub code: i64,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_crypto::Keypair;
    use crate::test_utils::signed_message;

    #[test]
    fn query_parses_by_method() {
        let raw = r#"{"jsonrpc":"2.0","method":"subscribe","id":3,"params":{"channel":"/root/x"}}"#;
        let req: Request = serde_json::from_str(raw).unwrap();
        assert_eq!(req.query.id(), Some(3));
        assert_eq!(req.query.channel(), "/root/x");
        assert!(matches!(req.query, Query::Subscribe { .. }));
    }

    #[test]
    fn broadcast_has_no_id() {
        let kp = Keypair::generate();
        let msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "state"}));
        let req = Request::broadcast("/root/x", msg);
        assert_eq!(req.query.id(), None);

        let raw = serde_json::to_string(&req).unwrap();
        assert!(raw.contains("\"method\":\"message\""));
        let back: Request = serde_json::from_str(&raw).unwrap();
        assert!(matches!(back.query, Query::Broadcast { .. }));
    }

    #[test]
    fn verify_accepts_well_formed_message() {
        let kp = Keypair::generate();
        let msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "create"}));
        msg.verify().unwrap();
    }

    #[test]
    fn verify_rejects_tampering() {
        let kp = Keypair::generate();
        let mut msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "create"}));
        msg.data = B64.encode(b"{\"object\":\"lao\",\"action\":\"update\"}");
        assert!(msg.verify().is_err());

        let other = Keypair::generate();
        let mut msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "create"}));
        msg.sender = other.public().to_base64();
        assert!(msg.verify().is_err());
    }

    #[test]
    fn verify_rejects_wrong_id() {
        let kp = Keypair::generate();
        let mut msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "create"}));
        msg.message_id = "AAAA".to_string();
        assert!(msg.verify().is_err());
    }

    #[test]
    fn answer_error_serializes_code() {
        let answer = Answer::error(Some(7), -3, "message already exists");
        let raw = serde_json::to_string(&answer).unwrap();
        assert!(raw.contains("\"code\":-3"));
        assert!(!raw.contains("\"result\""));
    }

    #[test]
    fn answer_result_variants() {
        let ack = serde_json::to_value(Answer::result(1, AnswerResult::General(0))).unwrap();
        assert_eq!(ack["result"], 0);

        let kp = Keypair::generate();
        let msg = signed_message(&kp, &serde_json::json!({"object": "lao", "action": "state"}));
        let catchup =
            serde_json::to_value(Answer::result(2, AnswerResult::Messages(vec![msg]))).unwrap();
        assert!(catchup["result"].is_array());
    }
}
