//! Argon2id password hashing.
//!
//! Hashes are PHC strings with an embedded random salt and the crate's
//! default cost parameters. Both directions are expensive on purpose; async
//! callers go through the `*_blocking` variants so the work lands on tokio's
//! blocking pool instead of stalling request workers.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::{rngs::OsRng, TryRngCore};
use std::sync::LazyLock;
use zeroize::{Zeroize, Zeroizing};

const SALT_BYTES: usize = 16;

/// PHC string checked when a login names no account, so an unknown email
/// costs the same Argon2 work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("tenantgate-unknown-account").ok());

#[derive(Debug, thiserror::Error)]
pub enum HashingError {
    #[error("salt generation failed: {0}")]
    Salt(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(String),
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, HashingError> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| HashingError::Salt(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashingError::Salt(e.to_string()));
    salt_bytes.zeroize();

    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt?)
        .map_err(|e| HashingError::Hash(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a password against a stored PHC string.
///
/// A malformed hash verifies as `false`. The digest comparison inside
/// `argon2` is constant-time.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, HashingError> {
    let password = Zeroizing::new(password);
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| HashingError::Task(e.to_string()))?
}

/// Check login credentials against an account's stored hash, if there is one.
///
/// With no account the password is still run through Argon2 against a dummy
/// hash and the result is `false`.
pub fn verify_credentials(hash: Option<&str>, password: &str) -> bool {
    match hash {
        Some(hash) => verify_password(hash, password),
        None => {
            match DUMMY_HASH.as_deref() {
                Some(dummy) => {
                    std::hint::black_box(verify_password(dummy, password));
                }
                None => {
                    std::hint::black_box(hash_password(password).is_ok());
                }
            }
            false
        }
    }
}

/// [`verify_credentials`] on the blocking pool. A failed task counts as a mismatch.
pub async fn verify_credentials_blocking(hash: Option<String>, password: String) -> bool {
    let password = Zeroizing::new(password);
    let task = move || verify_credentials(hash.as_deref(), &password);
    match tokio::task::spawn_blocking(task).await {
        Ok(valid) => valid,
        Err(e) => {
            tracing::error!(error = %e, "Password verification task failed");
            false
        }
    }
}
