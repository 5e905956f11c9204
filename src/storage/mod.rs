//! Storage layer for developers, applications, end users, and sessions.
//!
//! Handlers and the authorization gate only see the [`Store`] trait; the
//! backend is chosen at startup and injected through `AppState`.
//! "Not found" is always `Ok(None)` / `Ok(false)`, never an error.

pub mod memory;
pub mod redis;

use crate::models::{Application, StoredDeveloper, StoredSession, StoredUser};
use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated. Names the kind of record.
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(format!("Redis error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("JSON error: {}", err))
    }
}

/// Record store used by the authorization gate and handlers.
///
/// Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with `Conflict("Developer")` if the email is taken.
    async fn create_developer(&self, developer: &StoredDeveloper) -> Result<(), StoreError>;

    async fn get_developer(&self, id: &str) -> Result<Option<StoredDeveloper>, StoreError>;

    async fn get_developer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<StoredDeveloper>, StoreError>;

    /// Fails with `Conflict("Application key")` if either key is already in use.
    async fn create_application(&self, application: &Application) -> Result<(), StoreError>;

    async fn list_applications(&self, developer_id: &str) -> Result<Vec<Application>, StoreError>;

    /// Owner-scoped lookup: another developer's application is `None`.
    async fn get_application(
        &self,
        id: &str,
        developer_id: &str,
    ) -> Result<Option<Application>, StoreError>;

    /// Owner-scoped update of name and domain. Returns the updated record.
    async fn update_application(
        &self,
        id: &str,
        developer_id: &str,
        name: &str,
        domain: &str,
    ) -> Result<Option<Application>, StoreError>;

    /// Owner-scoped delete, cascading to the application's users and sessions.
    async fn delete_application(&self, id: &str, developer_id: &str) -> Result<bool, StoreError>;

    async fn get_application_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<Application>, StoreError>;

    /// Fails with `Conflict("User")` if the email is taken within the application.
    async fn create_user(&self, user: &StoredUser) -> Result<(), StoreError>;

    async fn get_user(&self, id: &str) -> Result<Option<StoredUser>, StoreError>;

    async fn get_user_by_email(
        &self,
        application_id: &str,
        email: &str,
    ) -> Result<Option<StoredUser>, StoreError>;

    async fn list_users(&self, application_id: &str) -> Result<Vec<StoredUser>, StoreError>;

    async fn create_session(&self, session: &StoredSession) -> Result<(), StoreError>;

    /// Returns the record regardless of expiry; callers decide validity.
    async fn get_session_by_token(&self, token: &str)
        -> Result<Option<StoredSession>, StoreError>;

    /// Returns true if a session was deleted.
    async fn delete_session(&self, id: &str) -> Result<bool, StoreError>;

    /// Backend liveness check for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
