//! Certificate construction and verification (§4.1 of the core design).

use chrono::Utc;
use garl_types::app::{
    AgentId, Certificate, CertificatePayload, CertificateProof, TraceId, TraceStatus,
};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;
use crate::error::CryptoError;
use crate::key::SigningKey;

const CONTEXT: &str = "https://garl.dev/contexts/v1";
const CERT_TYPE: &str = "CertifiedExecutionTrace";
const ALG: &str = "ECDSA-secp256k1";

/// SHA-256 of the canonical JSON serialisation of `payload`.
pub fn hash_canonical<T: serde::Serialize>(payload: &T) -> Result<String, CryptoError> {
    let canonical = canonicalize(payload)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(hex::encode(digest))
}

fn digest_bytes(canonical: &str) -> [u8; 32] {
    Sha256::digest(canonical.as_bytes()).into()
}

/// Produces the signed certificate for a persisted trace.
///
/// `trace_hash` must already equal `hash_canonical` of the trace's canonical
/// payload; this function re-derives the digest deterministically from the
/// certificate payload itself so the signature always covers exactly what the
/// certificate claims.
pub fn sign(
    key: &SigningKey,
    trace_id: TraceId,
    agent_id: AgentId,
    status: TraceStatus,
    trust_score_after: f64,
    trace_hash: &str,
) -> Result<Certificate, CryptoError> {
    let created = Utc::now();
    let payload = CertificatePayload {
        trace_id,
        agent_id,
        status,
        trust_score_after,
        trace_hash: trace_hash.to_string(),
        created,
    };
    let canonical = canonicalize(&payload)?;
    let digest = digest_bytes(&canonical);
    let signature = key.sign_digest(&digest)?;

    Ok(Certificate {
        context: CONTEXT.to_string(),
        cert_type: CERT_TYPE.to_string(),
        payload,
        proof: CertificateProof {
            proof_type: ALG.to_string(),
            created,
            public_key: key.public_key_hex(),
            signature: hex::encode(signature.to_der().as_bytes()),
            alg: ALG.to_string(),
        },
    })
}

/// Verifies that `certificate.proof` is a valid ECDSA-secp256k1 signature over
/// `certificate.payload`, produced by the holder of `certificate.proof.public_key`.
pub fn verify(certificate: &Certificate) -> Result<bool, CryptoError> {
    let canonical = canonicalize(&certificate.payload)?;
    let digest = digest_bytes(&canonical);

    let public_key_bytes = hex::decode(&certificate.proof.public_key)
        .map_err(|e| CryptoError::InvalidKey(format!("public key not valid hex: {e}")))?;
    let verifying_key = VerifyingKey::from_sec1_bytes(&public_key_bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("public key not a valid point: {e}")))?;

    let signature_bytes = hex::decode(&certificate.proof.signature)
        .map_err(|e| CryptoError::OperationFailed(format!("signature not valid hex: {e}")))?;
    let signature = Signature::from_der(&signature_bytes)
        .map_err(|e| CryptoError::OperationFailed(format!("signature not valid DER: {e}")))?;

    Ok(verifying_key.verify_prehash(&digest, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_types::app::TraceStatus;
    use uuid::Uuid;

    #[test]
    fn sign_then_verify_round_trips() {
        let key = SigningKey::generate();
        let cert = sign(
            &key,
            Uuid::new_v4(),
            Uuid::new_v4(),
            TraceStatus::Success,
            65.0,
            "deadbeef",
        )
        .unwrap();
        assert!(verify(&cert).unwrap());
    }

    #[test]
    fn verify_fails_on_tampered_payload() {
        let key = SigningKey::generate();
        let mut cert = sign(
            &key,
            Uuid::new_v4(),
            Uuid::new_v4(),
            TraceStatus::Success,
            65.0,
            "deadbeef",
        )
        .unwrap();
        cert.payload.trust_score_after = 99.0;
        assert!(!verify(&cert).unwrap());
    }
}
