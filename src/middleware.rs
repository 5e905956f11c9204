//! Response hardening and CORS.

use crate::auth::middleware::{
    PUBLIC_KEY_HEADER, SESSION_TOKEN_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use crate::config::Config;
use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Middleware that adds security headers to all responses.
///
/// - **Cache-Control: no-store**: responses carry secret keys, bearer
///   tokens, and session tokens; nothing may be cached.
/// - **X-Content-Type-Options: nosniff**
/// - **Referrer-Policy: no-referrer**
/// - **X-Frame-Options: DENY**
///
/// # Usage
///
/// ```rust,no_run
/// use axum::Router;
/// use axum::middleware;
/// use tenantgate::middleware::security_headers;
///
/// let app: Router = Router::new()
///     .layer(middleware::from_fn(security_headers));
/// ```
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));

    response
}

/// CORS policy for browser clients of the API.
///
/// Allows the gate's authentication headers. Origins come from
/// `CORS_ALLOWED_ORIGINS`; unparseable entries are skipped.
pub fn cors_layer(config: &Config) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(PUBLIC_KEY_HEADER),
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderName::from_static(TIMESTAMP_HEADER),
            HeaderName::from_static(SESSION_TOKEN_HEADER),
        ])
}
