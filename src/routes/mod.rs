//! API route handlers.

pub mod applications;
pub mod developers;
pub mod users;

use crate::auth::middleware::AppState;
use crate::error::AppError;
use crate::models::ApiResponse;
use axum::{
    body::Bytes,
    extract::{FromRequest, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};

/// Longest accepted email address.
const MAX_EMAIL_LEN: usize = 254;
/// Minimum password length at registration.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Longest accepted password; bounds hashing work per request.
const MAX_PASSWORD_LEN: usize = 1024;
const MAX_NAME_LEN: usize = 100;
const MAX_DOMAIN_LEN: usize = 253;

/// JSON body extractor whose rejection is an [`AppError`] in the response envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Parse a JSON payload from raw body bytes already consumed by a signature check.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        AppError::InvalidRequest("Invalid request format".to_string())
    })
}

/// Trim and lowercase an email, rejecting anything without a local part and a domain.
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && matches!(
            email.split_once('@'),
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        );

    if !valid {
        return Err(AppError::InvalidRequest("Invalid email address".to_string()));
    }
    Ok(email)
}

/// Password rules applied when an account is created.
pub fn validate_new_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::InvalidRequest("Password is too long".to_string()));
    }
    Ok(())
}

/// Validate an application's name and domain, returning them trimmed.
pub fn validate_application(name: &str, domain: &str) -> Result<(String, String), AppError> {
    let name = name.trim();
    let domain = domain.trim();

    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Name must be 1-{} characters",
            MAX_NAME_LEN
        )));
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(AppError::InvalidRequest("Domain is too long".to_string()));
    }
    Ok((name.to_string(), domain.to_string()))
}

/// Optional personal name field, trimmed.
pub(crate) fn clean_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Names must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Wrap a payload in the success envelope.
pub(crate) fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub storage: &'static str,
}

/// GET /health: Liveness plus storage reachability
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(HealthStatus {
                status: "ok",
                storage: "ok",
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<()>::failure("Storage unavailable")),
            )
                .into_response()
        }
    }
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Developer account endpoints (bearer token)
        .route("/api/auth/register", post(developers::register))
        .route("/api/auth/login", post(developers::login))
        .route("/api/auth/me", get(developers::me))
        // Application management (bearer token, owner-scoped)
        .route(
            "/api/applications",
            post(applications::create_application).get(applications::list_applications),
        )
        .route(
            "/api/applications/{id}",
            get(applications::get_application)
                .put(applications::update_application)
                .delete(applications::delete_application),
        )
        .route(
            "/api/applications/{id}/users",
            get(applications::list_application_users),
        )
        // End-user endpoints (application signature, plus session where noted)
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route("/api/users/me", get(users::me))
        .route("/api/users/logout", post(users::logout))
}
