//! Webhook payload signing and verification.
//!
//! SmartRecruiters signs webhook deliveries with HMAC-SHA256 over the raw
//! request body and sends the result as `sha256=<hex digest>`. Verification
//! uses a constant-time comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix convention used by the signature header.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors that can occur while computing a signature.
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Sign a payload with HMAC-SHA256, returning the `sha256=<hex>` form.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(payload);
    let digest = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{SIGNATURE_PREFIX}{digest}"))
}

/// Verify a `sha256=<hex>` signature against a payload.
///
/// Returns `false` for a missing prefix, malformed hex, or a digest mismatch.
/// The digest comparison is constant-time via `Mac::verify_slice`.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
