//! Ed25519 key material.
//!
//! [`Keypair`] is the hub's own signing identity (the organizer key);
//! [`PublicKey`] is the parsed form of a sender's base64 key as it appears
//! in message envelopes.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Errors raised while parsing or verifying key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key: {0}")]
    InvalidKey(String),
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),
}

/// An ed25519 signing keypair.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the system RNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// The public half of this keypair.
    pub fn public(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    /// Sign `data`, returning the base64-encoded signature.
    pub fn sign(&self, data: &[u8]) -> String {
        B64.encode(self.signing.sign(data).to_bytes())
    }
}

/// A parsed ed25519 public key, hashable so it can serve as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse a base64-encoded 32-byte ed25519 public key.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = B64
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self(key))
    }

    /// The base64 wire form of this key.
    pub fn to_base64(&self) -> String {
        B64.encode(self.0.to_bytes())
    }

    /// Check a base64-encoded signature over `data`.
    pub fn verify(&self, data: &[u8], signature_b64: &str) -> Result<(), CryptoError> {
        let sig_bytes = B64
            .decode(signature_b64)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let sig = Signature::from_slice(&sig_bytes)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        self.0
            .verify(data, &sig)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}
