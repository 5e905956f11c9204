//! Authentication layer: credential primitives, sessions, and the request gate.

pub mod keys;
pub mod middleware;
pub mod password;
pub mod session;
pub mod signature;
pub mod token;

pub use keys::{generate_id, generate_session_token, issue_keypair, KeyPair};
pub use middleware::{AppState, ApplicationAuth, DeveloperAuth, Identity, SessionAuth};
pub use password::{hash_password, verify_password};
pub use session::{SessionError, SessionManager};
pub use signature::{sign_request, verify_request_signature};
pub use token::{TokenError, TokenIssuer};

/// Upper bound on any configured token or session lifetime (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Convert a configured lifetime in seconds to a `chrono::Duration`,
/// clamped to `MAX_TTL_SECS`.
pub(crate) fn ttl_duration(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}
