//! End-user session lifecycle: create, resolve, invalidate.

use super::keys::{generate_id, generate_session_token, KeyGenerationError};
use crate::models::{StoredSession, StoredUser};
use crate::storage::{Store, StoreError};
use chrono::{Duration, Utc};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown token, a token from another application, or a vanished user.
    #[error("session not found")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    KeyGeneration(#[from] KeyGenerationError),
}

/// Issues and resolves opaque session tokens for end users.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, ttl_secs: u64) -> Self {
        SessionManager {
            store,
            ttl: super::ttl_duration(ttl_secs),
        }
    }

    /// Create a session for `user_id` under `application_id`.
    pub async fn create(
        &self,
        user_id: &str,
        application_id: &str,
    ) -> Result<StoredSession, SessionError> {
        let now = Utc::now();
        let session = StoredSession {
            id: generate_id(),
            user_id: user_id.to_string(),
            application_id: application_id.to_string(),
            token: generate_session_token()?,
            expires_at: now + self.ttl,
            created_at: now,
        };

        self.store.create_session(&session).await?;

        tracing::info!(
            action = "session_created",
            session_id = %session.id,
            user_id = %user_id,
            application_id = %application_id,
            "Session created"
        );

        Ok(session)
    }

    /// Resolve a token presented to `application_id` into its session and user.
    ///
    /// A session is valid strictly before `expires_at`. Expired sessions are
    /// left in place.
    pub async fn resolve(
        &self,
        token: &str,
        application_id: &str,
    ) -> Result<(StoredSession, StoredUser), SessionError> {
        let session = self
            .store
            .get_session_by_token(token)
            .await?
            .ok_or(SessionError::NotFound)?;

        if session.application_id != application_id {
            return Err(SessionError::NotFound);
        }
        if session.is_expired_at(Utc::now()) {
            return Err(SessionError::Expired);
        }

        let user = self
            .store
            .get_user(&session.user_id)
            .await?
            .filter(|user| user.application_id == application_id)
            .ok_or(SessionError::NotFound)?;

        Ok((session, user))
    }

    /// Delete a session. Deleting an unknown id is not an error.
    pub async fn invalidate(&self, session_id: &str) -> Result<(), SessionError> {
        if self.store.delete_session(session_id).await? {
            tracing::info!(
                action = "session_invalidated",
                session_id = %session_id,
                "Session invalidated"
            );
        }
        Ok(())
    }
}
