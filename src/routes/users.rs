//! End-user endpoints, called by application backends with a signed request.

use super::{clean_name, normalize_email, ok, parse_body, validate_new_password};
use crate::auth::keys::generate_id;
use crate::auth::middleware::{AppState, ApplicationAuth, SessionAuth};
use crate::auth::password::{hash_password_blocking, verify_credentials_blocking};
use crate::error::AppError;
use crate::models::{
    ApiResponse, LoginRequest, SessionResponse, StoredUser, UserProfile, UserRegisterRequest,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

/// POST /api/users/register: Register an end user and open a session
pub async fn register(
    State(state): State<AppState>,
    auth: ApplicationAuth,
) -> Result<impl IntoResponse, AppError> {
    let req: UserRegisterRequest = parse_body(&auth.body)?;
    let application_id = &auth.application.id;

    let email = normalize_email(&req.email)?;
    validate_new_password(&req.password)?;
    let first_name = clean_name(&req.first_name)?;
    let last_name = clean_name(&req.last_name)?;

    if state
        .store
        .get_user_by_email(application_id, &email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let password_hash = hash_password_blocking(req.password).await?;

    let user = StoredUser {
        id: generate_id(),
        application_id: application_id.clone(),
        email,
        first_name,
        last_name,
        password_hash,
        created_at: Utc::now(),
    };
    state.store.create_user(&user).await?;

    let session = state.sessions.create(&user.id, application_id).await?;

    tracing::info!(
        action = "user_registered",
        identity = %auth.identity(),
        user_id = %user.id,
        "End user registered"
    );

    Ok((
        StatusCode::CREATED,
        ok(SessionResponse {
            session_token: session.token,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/users/login: Exchange end-user credentials for a session token
pub async fn login(
    State(state): State<AppState>,
    auth: ApplicationAuth,
) -> Result<impl IntoResponse, AppError> {
    let req: LoginRequest = parse_body(&auth.body)?;
    let application_id = &auth.application.id;
    let email = req.email.trim().to_lowercase();

    let user = state
        .store
        .get_user_by_email(application_id, &email)
        .await?;

    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = verify_credentials_blocking(hash, req.password).await;

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::warn!(
                action = "login_failed",
                identity = %auth.identity(),
                "End user login failed"
            );
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    let session = state.sessions.create(&user.id, application_id).await?;

    tracing::info!(
        action = "user_login",
        identity = %auth.identity(),
        user_id = %user.id,
        "End user logged in"
    );

    Ok(ok(SessionResponse {
        session_token: session.token,
        expires_at: session.expires_at,
    }))
}

/// GET /api/users/me: Profile of the session's end user
pub async fn me(auth: SessionAuth) -> Result<impl IntoResponse, AppError> {
    Ok(ok(UserProfile::from(auth.user)))
}

/// POST /api/users/logout: Invalidate the presented session
pub async fn logout(
    State(state): State<AppState>,
    auth: SessionAuth,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.invalidate(&auth.session.id).await?;

    tracing::info!(
        action = "user_logout",
        identity = %auth.identity(),
        application_id = %auth.application.id,
        "End user logged out"
    );

    Ok(Json(ApiResponse::empty()))
}
