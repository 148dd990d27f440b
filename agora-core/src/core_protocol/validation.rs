//! Schema validation seam.
//!
//! The hub validates every inbound envelope and every decoded payload before
//! interpreting it. Full JSON-schema validation is a collaborator concern;
//! the core depends only on the [`SchemaValidator`] trait and ships
//! [`StructuralValidator`], which enforces the structural minimum the
//! dispatch code relies on.

use serde_json::Value;
use thiserror::Error;

use crate::core_protocol::envelope::JSON_RPC_VERSION;

/// Which schema a blob is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// A full request envelope as read off the wire.
    GenericMessage,
    /// A decoded message payload (`object`/`action` object).
    Data,
}

/// Errors raised by validation and message integrity checks.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("schema mismatch: {0}")]
    Schema(String),
    #[error("message integrity: {0}")]
    Integrity(String),
}

/// Validates raw JSON against a named schema.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, raw: &[u8], kind: SchemaKind) -> Result<(), ValidationError>;
}

/// Structural validator: checks the fields dispatch depends on.
#[derive(Debug, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    fn require_str(obj: &Value, field: &str) -> Result<(), ValidationError> {
        match obj.get(field) {
            Some(Value::String(_)) => Ok(()),
            Some(_) => Err(ValidationError::Schema(format!(
                "field {field:?} must be a string"
            ))),
            None => Err(ValidationError::Schema(format!("missing field {field:?}"))),
        }
    }
}

impl SchemaValidator for StructuralValidator {
    fn validate(&self, raw: &[u8], kind: SchemaKind) -> Result<(), ValidationError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| ValidationError::Schema(format!("not valid JSON: {e}")))?;
        if !value.is_object() {
            return Err(ValidationError::Schema("expected a JSON object".to_string()));
        }

        match kind {
            SchemaKind::GenericMessage => {
                if value.get("jsonrpc").and_then(Value::as_str) != Some(JSON_RPC_VERSION) {
                    return Err(ValidationError::Schema(format!(
                        "jsonrpc must be {JSON_RPC_VERSION:?}"
                    )));
                }
                Self::require_str(&value, "method")?;
                if !value.get("params").is_some_and(Value::is_object) {
                    return Err(ValidationError::Schema(
                        "params must be an object".to_string(),
                    ));
                }
            }
            SchemaKind::Data => {
                Self::require_str(&value, "object")?;
                Self::require_str(&value, "action")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_message_requires_envelope_fields() {
        let v = StructuralValidator;
        let ok = br#"{"jsonrpc":"2.0","method":"subscribe","id":1,"params":{"channel":"/root/x"}}"#;
        v.validate(ok, SchemaKind::GenericMessage).unwrap();

        let bad_version = br#"{"jsonrpc":"1.0","method":"subscribe","params":{}}"#;
        assert!(v.validate(bad_version, SchemaKind::GenericMessage).is_err());

        let no_params = br#"{"jsonrpc":"2.0","method":"subscribe","id":1}"#;
        assert!(v.validate(no_params, SchemaKind::GenericMessage).is_err());
    }

    #[test]
    fn data_requires_object_and_action() {
        let v = StructuralValidator;
        v.validate(br#"{"object":"lao","action":"create"}"#, SchemaKind::Data)
            .unwrap();
        assert!(v.validate(br#"{"object":"lao"}"#, SchemaKind::Data).is_err());
        assert!(v
            .validate(br#"{"object":1,"action":"create"}"#, SchemaKind::Data)
            .is_err());
    }

    #[test]
    fn garbage_is_a_schema_error() {
        let v = StructuralValidator;
        assert!(matches!(
            v.validate(b"not json", SchemaKind::GenericMessage),
            Err(ValidationError::Schema(_))
        ));
        assert!(v.validate(b"[1,2,3]", SchemaKind::Data).is_err());
    }
}
