//! Random credential generation: application key pairs and session tokens.

use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, TryRngCore};

pub const PUBLIC_KEY_PREFIX: &str = "pk_";
pub const SECRET_KEY_PREFIX: &str = "sk_";

/// Random bytes behind every key and session token.
pub const KEY_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("key generation failed: {0}")]
pub struct KeyGenerationError(String);

/// An application's public/secret key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// `KEY_BYTES` from the OS CSPRNG, URL-safe base64 without padding (43 chars).
fn random_url_safe() -> Result<String, KeyGenerationError> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| KeyGenerationError(e.to_string()))?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Issue a fresh `pk_`/`sk_` key pair for a new application.
pub fn issue_keypair() -> Result<KeyPair, KeyGenerationError> {
    Ok(KeyPair {
        public_key: format!("{}{}", PUBLIC_KEY_PREFIX, random_url_safe()?),
        secret_key: format!("{}{}", SECRET_KEY_PREFIX, random_url_safe()?),
    })
}

/// Generate an opaque end-user session token. Not derived from any user data.
pub fn generate_session_token() -> Result<String, KeyGenerationError> {
    random_url_safe()
}

/// Generate a record identifier.
pub fn generate_id() -> String {
    nanoid::nanoid!()
}
