//! Cryptographic primitives used by the hub.
//!
//! Ed25519 signatures for message authenticity and SHA-256 for the
//! content-derived message ids. Keys travel on the wire as base64 strings.

pub mod keypair;

pub use keypair::{CryptoError, Keypair, PublicKey};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Derive a message id from the base64 data and signature strings.
///
/// The id is base64(sha256(data_b64 || signature_b64)) and must match the
/// `message_id` field of every accepted message.
pub fn message_id(data_b64: &str, signature_b64: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data_b64.as_bytes());
    hasher.update(signature_b64.as_bytes());
    B64.encode(hasher.finalize())
}
