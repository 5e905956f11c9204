//! Application management endpoints. Every operation is scoped to the
//! authenticated developer; another developer's application is "not found".

use super::{ok, validate_application, AppJson};
use crate::auth::keys::{generate_id, issue_keypair};
use crate::auth::middleware::{AppState, DeveloperAuth};
use crate::error::AppError;
use crate::models::{
    ApiResponse, Application, ApplicationList, ApplicationRequest, UserList, UserProfile,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

fn not_found() -> AppError {
    AppError::NotFound("Application not found".to_string())
}

/// POST /api/applications: Create an application with a fresh key pair
pub async fn create_application(
    auth: DeveloperAuth,
    State(state): State<AppState>,
    AppJson(req): AppJson<ApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (name, domain) = validate_application(&req.name, &req.domain)?;
    let keys = issue_keypair()?;

    let application = Application {
        id: generate_id(),
        developer_id: auth.developer_id.clone(),
        name,
        domain,
        public_key: keys.public_key,
        secret_key: keys.secret_key,
        created_at: Utc::now(),
    };
    state.store.create_application(&application).await?;

    tracing::info!(
        action = "application_created",
        identity = %auth.identity(),
        application_id = %application.id,
        "Application created"
    );

    Ok((StatusCode::CREATED, ok(application)))
}

/// GET /api/applications: List the developer's applications
pub async fn list_applications(
    auth: DeveloperAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let applications = state.store.list_applications(&auth.developer_id).await?;
    let count = applications.len();

    Ok(ok(ApplicationList {
        applications,
        count,
    }))
}

/// GET /api/applications/{id}
pub async fn get_application(
    auth: DeveloperAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let application = state
        .store
        .get_application(&id, &auth.developer_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ok(application))
}

/// PUT /api/applications/{id}: Update name and domain. Keys never change.
pub async fn update_application(
    auth: DeveloperAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<ApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (name, domain) = validate_application(&req.name, &req.domain)?;

    let application = state
        .store
        .update_application(&id, &auth.developer_id, &name, &domain)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(
        action = "application_updated",
        identity = %auth.identity(),
        application_id = %application.id,
        "Application updated"
    );

    Ok(ok(application))
}

/// DELETE /api/applications/{id}: Delete with its end users and sessions
pub async fn delete_application(
    auth: DeveloperAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state
        .store
        .delete_application(&id, &auth.developer_id)
        .await?
    {
        return Err(not_found());
    }

    tracing::info!(
        action = "application_deleted",
        identity = %auth.identity(),
        application_id = %id,
        "Application deleted"
    );

    Ok(Json(ApiResponse::empty()))
}

/// GET /api/applications/{id}/users: End users registered under an owned application
pub async fn list_application_users(
    auth: DeveloperAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let application = state
        .store
        .get_application(&id, &auth.developer_id)
        .await?
        .ok_or_else(not_found)?;

    let users: Vec<UserProfile> = state
        .store
        .list_users(&application.id)
        .await?
        .into_iter()
        .map(UserProfile::from)
        .collect();
    let count = users.len();

    Ok(ok(UserList { users, count }))
}
