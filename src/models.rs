//! Request and response models for the API.
//!
//! All models use serde for serialization/deserialization.
//! Storage models carry the password hashes and are never returned directly;
//! handlers convert them into the profile views below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Response Envelope
// ============================================================================

/// Uniform `{success, error?, data?}` envelope wrapped around every response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            error: Some(message.into()),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    /// Success with no payload.
    pub fn empty() -> Self {
        ApiResponse {
            success: true,
            error: None,
            data: None,
        }
    }
}

// ============================================================================
// Developer Models
// ============================================================================

/// Request to register a developer account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperRegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Email/password login, shared by developers and end users.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Bearer token handed to a developer after register/login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Developer profile (no password hash).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredDeveloper> for DeveloperProfile {
    fn from(dev: StoredDeveloper) -> Self {
        DeveloperProfile {
            id: dev.id,
            first_name: dev.first_name,
            last_name: dev.last_name,
            email: dev.email,
            created_at: dev.created_at,
        }
    }
}

// ============================================================================
// Application Models
// ============================================================================

/// Create/update payload for an application. Only name and domain are mutable.
#[derive(Debug, Deserialize)]
pub struct ApplicationRequest {
    pub name: String,
    pub domain: String,
}

/// Application record. Returned in full (secret key included) only to its owner.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub developer_id: String,
    pub name: String,
    pub domain: String,
    pub public_key: String,
    pub secret_key: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id)
            .field("developer_id", &self.developer_id)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct ApplicationList {
    pub applications: Vec<Application>,
    pub count: usize,
}

// ============================================================================
// End User Models
// ============================================================================

/// Request to register an end user under the signing application.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Session credential handed to an end user after register/login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

/// End user profile (no password hash).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub application_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserProfile {
    fn from(user: StoredUser) -> Self {
        UserProfile {
            id: user.id,
            application_id: user.application_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserProfile>,
    pub count: usize,
}

// ============================================================================
// Storage Models
// ============================================================================

/// Developer data as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDeveloper {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// End user data as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: String,
    pub application_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Session data as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: String,
    pub user_id: String,
    pub application_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoredSession {
    /// A session is valid iff `now < expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
