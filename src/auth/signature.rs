//! HMAC-SHA256 request signatures for application backends.
//!
//! Signed payload is the byte-exact concatenation
//! `timestamp ‖ method ‖ path ‖ body` with no delimiter. Signatures travel
//! as lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
#[error("invalid signing key")]
pub struct SignatureError;

fn request_mac(
    secret_key: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).map_err(|_| SignatureError)?;
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body);
    Ok(mac)
}

/// Compute the hex signature a client must send for a request.
pub fn sign_request(
    secret_key: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<String, SignatureError> {
    let mac = request_mac(secret_key, timestamp, method, path, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex signature against the request it claims to cover.
///
/// # Returns
/// * `true` only for the exact HMAC-SHA256 digest under `secret_key`
/// * `false` for any mismatch, malformed hex, or wrong length
///
/// The digest comparison is constant-time (`Mac::verify_slice`).
pub fn verify_request_signature(
    secret_key: &str,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &[u8],
    signature_hex: &str,
) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mac) = request_mac(secret_key, timestamp, method, path, body) else {
        return false;
    };
    mac.verify_slice(&signature).is_ok()
}
