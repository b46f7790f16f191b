// Path: crates/garl-webhook/src/signing.rs
//! HMAC-SHA256 body signing for outbound webhook deliveries.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes `hex(HMAC_SHA256(secret, body))`, sent as `X-Garl-Signature`.
///
/// The secret is arbitrary owner-chosen-length bytes (generated at
/// subscription creation), so a fixed-size key is never assumed.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_and_body_sign_identically() {
        let a = sign_body("s3cr3t", b"{\"event\":\"trace_recorded\"}");
        let b = sign_body("s3cr3t", b"{\"event\":\"trace_recorded\"}");
        assert_eq!(a, b);
    }

    #[test]
    fn different_secrets_sign_differently() {
        let a = sign_body("s3cr3t-one", b"body");
        let b = sign_body("s3cr3t-two", b"body");
        assert_ne!(a, b);
    }
}
