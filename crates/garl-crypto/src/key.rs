//! Process-wide ECDSA-secp256k1 key pair.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey as K256SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::CryptoError;

/// The process-wide signing key pair. Stateless aside from holding these
/// bytes in memory; read-only for the lifetime of the process once loaded.
pub struct SigningKey {
    inner: K256SigningKey,
}

impl SigningKey {
    /// Generates a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            inner: K256SigningKey::random(&mut OsRng),
        }
    }

    /// Loads a key from its 32-byte hex-encoded scalar representation.
    ///
    /// Returns `CryptoError::InvalidKey` if the hex is malformed or does not
    /// decode to a valid secp256k1 scalar; callers (`node`) should treat this
    /// as a fatal configuration error at startup.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not valid hex: {e}")))?;
        let inner = K256SigningKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("not a valid secp256k1 key: {e}")))?;
        Ok(Self { inner })
    }

    /// Returns the 32-byte hex-encoded scalar, for persisting a generated key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.inner.to_bytes())
    }

    /// Returns the hex-encoded SEC1-compressed public key, as served at the
    /// `.well-known` discovery endpoint.
    pub fn public_key_hex(&self) -> String {
        let verifying: VerifyingKey = *self.inner.verifying_key();
        hex::encode(verifying.to_encoded_point(true).as_bytes())
    }

    pub(crate) fn verifying_key(&self) -> VerifyingKey {
        *self.inner.verifying_key()
    }

    /// Signs `digest` (expected to already be a SHA-256 hash) and returns the
    /// raw signature.
    pub(crate) fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, CryptoError> {
        self.inner
            .sign_prehash(digest)
            .map_err(|e| CryptoError::OperationFailed(format!("ecdsa signing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let key = SigningKey::generate();
        let hex = key.to_hex();
        let loaded = SigningKey::from_hex(&hex).unwrap();
        assert_eq!(key.public_key_hex(), loaded.public_key_hex());
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(SigningKey::from_hex("not hex at all").is_err());
    }
}
