//! Developer account endpoints.

use super::{clean_name, normalize_email, ok, validate_new_password, AppJson};
use crate::auth::keys::generate_id;
use crate::auth::middleware::{AppState, DeveloperAuth};
use crate::auth::password::{hash_password_blocking, verify_credentials_blocking};
use crate::error::AppError;
use crate::models::{
    DeveloperProfile, DeveloperRegisterRequest, LoginRequest, StoredDeveloper, TokenResponse,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}

/// POST /api/auth/register: Create a developer account and sign them in
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<DeveloperRegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = normalize_email(&req.email)?;
    validate_new_password(&req.password)?;
    let first_name = clean_name(&req.first_name)?;
    let last_name = clean_name(&req.last_name)?;

    // Cheap pre-check; create_developer still enforces uniqueness
    if state.store.get_developer_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Developer already exists".to_string()));
    }

    let password_hash = hash_password_blocking(req.password).await?;

    let developer = StoredDeveloper {
        id: generate_id(),
        first_name,
        last_name,
        email,
        password_hash,
        created_at: Utc::now(),
    };
    state.store.create_developer(&developer).await?;

    let issued = state.tokens.issue(&developer.id)?;

    tracing::info!(
        action = "developer_registered",
        developer_id = %developer.id,
        "Developer registered"
    );

    Ok((
        StatusCode::CREATED,
        ok(TokenResponse {
            token: issued.token,
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /api/auth/login: Exchange email and password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();

    let developer = state.store.get_developer_by_email(&email).await?;
    let hash = developer.as_ref().map(|d| d.password_hash.clone());
    let verified = verify_credentials_blocking(hash, req.password).await;

    let developer = match developer {
        Some(developer) if verified => developer,
        Some(developer) => {
            tracing::warn!(
                action = "login_failed",
                developer_id = %developer.id,
                "Developer login failed"
            );
            return Err(invalid_credentials());
        }
        None => {
            tracing::warn!(action = "login_failed", "Developer login failed");
            return Err(invalid_credentials());
        }
    };

    let issued = state.tokens.issue(&developer.id)?;

    tracing::info!(
        action = "developer_login",
        developer_id = %developer.id,
        "Developer logged in"
    );

    Ok(ok(TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// GET /api/auth/me: Profile of the authenticated developer
pub async fn me(
    auth: DeveloperAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let developer = state
        .store
        .get_developer(&auth.developer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Developer not found".to_string()))?;

    Ok(ok(DeveloperProfile::from(developer)))
}
