//! Axum extractors for the authorization gate.
//!
//! Three policies, each terminal on failure (401, never forwarded):
//! - [`DeveloperAuth`]: `Authorization: Bearer <token>`
//! - [`ApplicationAuth`]: `X-Public-Key` / `X-Timestamp` / `X-Signature` over the raw request
//! - [`SessionAuth`]: application signature plus `X-Session-Token`
//!
//! Every rejection carries the same message. The reason is logged only.

use super::session::{SessionError, SessionManager};
use super::signature::verify_request_signature;
use super::token::TokenIssuer;
use crate::config::Config;
use crate::error::AppError;
use crate::models::{Application, StoredSession, StoredUser};
use crate::storage::Store;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, OriginalUri, Request},
    http::{request::Parts, HeaderMap, Method},
};
use std::sync::Arc;

pub const PUBLIC_KEY_HEADER: &str = "x-public-key";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenIssuer>,
    pub sessions: SessionManager,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl_secs);
        let sessions = SessionManager::new(store.clone(), config.session_ttl_secs);
        AppState {
            store,
            tokens: Arc::new(tokens),
            sessions,
            config: Arc::new(config),
        }
    }
}

/// Who a request was authorized as.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    Developer(String),
    Application(Application),
    User(StoredUser),
    #[default]
    Anonymous,
}

impl Identity {
    pub fn kind(&self) -> &'static str {
        match self {
            Identity::Developer(_) => "developer",
            Identity::Application(_) => "application",
            Identity::User(_) => "user",
            Identity::Anonymous => "anonymous",
        }
    }
}

/// Kind and record id only; never keys, tokens, or emails.
impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Developer(id) => write!(f, "developer:{}", id),
            Identity::Application(app) => write!(f, "application:{}", app.id),
            Identity::User(user) => write!(f, "user:{}", user.id),
            Identity::Anonymous => f.write_str("anonymous"),
        }
    }
}

fn reject(policy: &'static str, reason: &'static str) -> AppError {
    tracing::warn!(action = "auth_rejected", policy, reason, "Request rejected");
    AppError::unauthorized()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Developer policy: validate the bearer token and return the developer id.
pub fn authenticate_developer(
    headers: &HeaderMap,
    tokens: &TokenIssuer,
) -> Result<String, AppError> {
    let auth_header = header(headers, "authorization")
        .ok_or_else(|| reject("developer", "missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject("developer", "invalid authorization format"))?;

    tokens
        .validate(token)
        .map_err(|_| reject("developer", "invalid token"))
}

/// Application-signature policy: look up the application by public key and
/// verify the HMAC over `timestamp ‖ method ‖ path ‖ body`.
///
/// The timestamp is covered by the signature but not checked for freshness.
pub async fn authenticate_application(
    store: &dyn Store,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Application, AppError> {
    let (Some(public_key), Some(signature), Some(timestamp)) = (
        header(headers, PUBLIC_KEY_HEADER),
        header(headers, SIGNATURE_HEADER),
        header(headers, TIMESTAMP_HEADER),
    ) else {
        return Err(reject("application", "missing signature headers"));
    };

    let application = store
        .get_application_by_public_key(public_key)
        .await?
        .ok_or_else(|| reject("application", "unknown public key"))?;

    if !verify_request_signature(
        &application.secret_key,
        timestamp,
        method.as_str(),
        path,
        body,
        signature,
    ) {
        tracing::warn!(
            action = "auth_rejected",
            policy = "application",
            reason = "signature mismatch",
            application_id = %application.id,
            "Request rejected"
        );
        return Err(AppError::unauthorized());
    }

    Ok(application)
}

/// Session policy: resolve `X-Session-Token` within an authenticated application.
pub async fn authenticate_session(
    sessions: &SessionManager,
    application: &Application,
    headers: &HeaderMap,
) -> Result<(StoredSession, StoredUser), AppError> {
    let token = header(headers, SESSION_TOKEN_HEADER)
        .ok_or_else(|| reject("session", "missing session token"))?;

    match sessions.resolve(token, &application.id).await {
        Ok(resolved) => Ok(resolved),
        Err(SessionError::NotFound) => Err(reject("session", "session not found")),
        Err(SessionError::Expired) => Err(reject("session", "session expired")),
        Err(e) => Err(e.into()),
    }
}

/// Developer extractor.
///
/// Extracts the developer id from `Authorization: Bearer {token}`.
/// Returns 401 Unauthorized if missing or invalid.
pub struct DeveloperAuth {
    pub developer_id: String,
}

impl DeveloperAuth {
    pub fn identity(&self) -> Identity {
        Identity::Developer(self.developer_id.clone())
    }
}

impl FromRequestParts<AppState> for DeveloperAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let developer_id = authenticate_developer(&parts.headers, &state.tokens)?;
        Ok(DeveloperAuth { developer_id })
    }
}

/// Application extractor.
///
/// Consumes the request body (signed bytes), so it must be the last
/// extractor of a handler. Handlers parse JSON from `body` themselves.
pub struct ApplicationAuth {
    pub application: Application,
    pub body: Bytes,
}

impl ApplicationAuth {
    pub fn identity(&self) -> Identity {
        Identity::Application(self.application.clone())
    }
}

impl FromRequest<AppState> for ApplicationAuth {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        // Sign over the full path even when routed through a nested router
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        let body = axum::body::to_bytes(body, state.config.max_body_bytes)
            .await
            .map_err(|_| AppError::InvalidRequest("Request body too large".to_string()))?;

        let application = authenticate_application(
            state.store.as_ref(),
            &parts.method,
            &path,
            &parts.headers,
            &body,
        )
        .await?;

        Ok(ApplicationAuth { application, body })
    }
}

/// End-user session extractor. Runs the application policy first.
pub struct SessionAuth {
    pub application: Application,
    pub session: StoredSession,
    pub user: StoredUser,
}

impl SessionAuth {
    pub fn identity(&self) -> Identity {
        Identity::User(self.user.clone())
    }
}

impl FromRequest<AppState> for SessionAuth {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let ApplicationAuth { application, .. } = ApplicationAuth::from_request(req, state).await?;

        let (session, user) = authenticate_session(&state.sessions, &application, &headers).await?;

        Ok(SessionAuth {
            application,
            session,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::sign_request;
    use crate::storage::MemoryStore;
    use axum::http::HeaderValue;
    use chrono::Utc;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn application(id: &str, public_key: &str, secret_key: &str) -> Application {
        Application {
            id: id.to_string(),
            developer_id: "dev1".to_string(),
            name: "App".to_string(),
            domain: "app.example".to_string(),
            public_key: public_key.to_string(),
            secret_key: secret_key.to_string(),
            created_at: Utc::now(),
        }
    }

    async fn store_with_app() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_application(&application("app1", "pk_one", "sk_one"))
            .await
            .unwrap();
        store
    }

    const LOGIN_PATH: &str = "/api/users/login";

    /// Headers for a POST to [`LOGIN_PATH`] signed with `secret_key`.
    fn signed_headers(public_key: &str, secret_key: &str, ts: &str, body: &[u8]) -> HeaderMap {
        let sig = sign_request(secret_key, ts, "POST", LOGIN_PATH, body).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(PUBLIC_KEY_HEADER, HeaderValue::from_str(public_key).unwrap());
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(ts).unwrap());
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&sig).unwrap());
        headers
    }

    async fn check_signature(
        store: &MemoryStore,
        method: Method,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Application, AppError> {
        authenticate_application(store, &method, LOGIN_PATH, headers, body).await
    }

    fn assert_unauthorized(result: Result<impl std::any::Any, AppError>) {
        match result {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Unauthorized"),
            Err(other) => panic!("expected Unauthorized, got {:?}", other),
            Ok(_) => panic!("expected Unauthorized, got Ok"),
        }
    }

    #[test]
    fn test_developer_policy() {
        let tokens = TokenIssuer::new(SECRET.as_bytes(), 3600);
        let issued = tokens.issue("dev1").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", issued.token)).unwrap(),
        );
        assert_eq!(authenticate_developer(&headers, &tokens).unwrap(), "dev1");

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Token {}", issued.token)).unwrap(),
        );
        assert_unauthorized(authenticate_developer(&headers, &tokens));

        assert_unauthorized(authenticate_developer(&HeaderMap::new(), &tokens));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer garbage"));
        assert_unauthorized(authenticate_developer(&headers, &tokens));
    }

    #[tokio::test]
    async fn test_application_policy_accepts_exact_signature() {
        let store = store_with_app().await;
        let body = br#"{"email":"u@x.com"}"#;
        let headers = signed_headers("pk_one", "sk_one", "1700000000", body);

        let app = check_signature(&store, Method::POST, &headers, body)
            .await
            .unwrap();
        assert_eq!(app.id, "app1");
    }

    #[tokio::test]
    async fn test_stale_timestamp_still_accepted() {
        let store = store_with_app().await;
        let headers = signed_headers("pk_one", "sk_one", "1", b"");

        assert!(check_signature(&store, Method::POST, &headers, b"")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_application_policy_rejections_are_uniform() {
        let store = store_with_app().await;

        // Wrong secret
        let headers = signed_headers("pk_one", "sk_wrong", "1700000000", b"");
        assert_unauthorized(check_signature(&store, Method::POST, &headers, b"").await);

        // Unknown public key
        let headers = signed_headers("pk_unknown", "sk_one", "1700000000", b"");
        assert_unauthorized(check_signature(&store, Method::POST, &headers, b"").await);

        // Missing signature header
        let mut headers = signed_headers("pk_one", "sk_one", "1700000000", b"");
        headers.remove(SIGNATURE_HEADER);
        assert_unauthorized(check_signature(&store, Method::POST, &headers, b"").await);

        // Signed a different method
        let headers = signed_headers("pk_one", "sk_one", "1700000000", b"");
        assert_unauthorized(check_signature(&store, Method::GET, &headers, b"").await);

        // Body tampered after signing
        let headers = signed_headers("pk_one", "sk_one", "1700000000", b"{}");
        assert_unauthorized(check_signature(&store, Method::POST, &headers, b"{ }").await);
    }

    #[tokio::test]
    async fn test_session_policy_scoped_to_application() {
        let store = store_with_app().await;
        store
            .create_application(&application("app2", "pk_two", "sk_two"))
            .await
            .unwrap();
        store
            .create_user(&StoredUser {
                id: "u1".to_string(),
                application_id: "app1".to_string(),
                email: "u@x.com".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "hash".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let sessions = SessionManager::new(store.clone(), 3600);
        let session = sessions.create("u1", "app1").await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            SESSION_TOKEN_HEADER,
            HeaderValue::from_str(&session.token).unwrap(),
        );

        let app1 = application("app1", "pk_one", "sk_one");
        let (_, user) = authenticate_session(&sessions, &app1, &headers).await.unwrap();
        assert_eq!(user.id, "u1");

        let app2 = application("app2", "pk_two", "sk_two");
        assert_unauthorized(authenticate_session(&sessions, &app2, &headers).await);

        assert_unauthorized(authenticate_session(&sessions, &app1, &HeaderMap::new()).await);
    }

    #[test]
    fn test_identity_display_hides_secrets() {
        let app = application("app1", "pk_one", "sk_secret");
        let shown = Identity::Application(app).to_string();
        assert_eq!(shown, "application:app1");
        assert!(!shown.contains("sk_secret"));

        assert_eq!(Identity::Developer("d1".to_string()).to_string(), "developer:d1");
        assert_eq!(Identity::default().kind(), "anonymous");
    }
}
