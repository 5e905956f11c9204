//! Error types and Axum response conversions.

use crate::auth::keys::KeyGenerationError;
use crate::auth::password::HashingError;
use crate::auth::session::SessionError;
use crate::auth::token::TokenError;
use crate::models::ApiResponse;
use crate::storage::StoreError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Message returned by every authorization gate rejection.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// The uniform gate rejection. Carries no hint about which check failed.
    pub fn unauthorized() -> Self {
        AppError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                "Internal server error".to_string()
            }
            AppError::InvalidRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg) => msg,
        };

        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => AppError::Conflict(format!("{} already exists", what)),
            StoreError::Backend(msg) => AppError::Internal(format!("Storage error: {}", msg)),
        }
    }
}

impl From<HashingError> for AppError {
    fn from(err: HashingError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<KeyGenerationError> for AppError {
    fn from(err: KeyGenerationError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidToken => AppError::unauthorized(),
            TokenError::Signing(msg) => {
                AppError::Internal(format!("Token signing failed: {}", msg))
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound | SessionError::Expired => AppError::unauthorized(),
            SessionError::Storage(e) => e.into(),
            SessionError::KeyGeneration(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        AppError::InvalidRequest("Invalid request format".to_string())
    }
}
