pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod storage;

use auth::middleware::AppState;
use axum::Router;

/// Full HTTP application: API routes plus body limit, CORS, and security headers.
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    routes::api_router()
        .layer(axum::extract::DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware::cors_layer(&config))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .with_state(state)
}
