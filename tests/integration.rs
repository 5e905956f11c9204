//! Integration tests for the tenantgate API.
//!
//! Each test spins up a real server on an ephemeral port backed by the
//! in-memory store, and talks to it over HTTP with reqwest.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tenantgate::{
    auth::{middleware::AppState, signature::sign_request},
    config::Config,
    storage::MemoryStore,
};

const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Spin up a test server and return its base URL.
async fn spawn_server_with(config: Config) -> String {
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    let app = tenantgate::app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn spawn_test_server() -> String {
    spawn_server_with(Config::with_secret(JWT_SECRET)).await
}

/// An application's credentials as returned at creation.
struct AppKeys {
    id: String,
    public_key: String,
    secret_key: String,
}

async fn register_developer(client: &reqwest::Client, base_url: &str, email: &str) -> String {
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({"firstName": "Test", "email": email, "password": "pw123456"}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), 201);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_application(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    name: &str,
) -> AppKeys {
    let resp = client
        .post(format!("{}/api/applications", base_url))
        .bearer_auth(token)
        .json(&json!({"name": name, "domain": "shop.example"}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(resp.status(), 201);

    let body: Value = resp.json().await.unwrap();
    AppKeys {
        id: body["data"]["id"].as_str().unwrap().to_string(),
        public_key: body["data"]["publicKey"].as_str().unwrap().to_string(),
        secret_key: body["data"]["secretKey"].as_str().unwrap().to_string(),
    }
}

/// Send a request signed the way an application backend would.
async fn signed(
    client: &reqwest::Client,
    base_url: &str,
    method: reqwest::Method,
    path: &str,
    public_key: &str,
    secret_key: &str,
    timestamp: &str,
    session_token: Option<&str>,
    body: &str,
) -> reqwest::Response {
    let signature = sign_request(
        secret_key,
        timestamp,
        method.as_str(),
        path,
        body.as_bytes(),
    )
    .unwrap();

    let mut req = client
        .request(method, format!("{}{}", base_url, path))
        .header("Content-Type", "application/json")
        .header("X-Public-Key", public_key)
        .header("X-Timestamp", timestamp)
        .header("X-Signature", signature)
        .body(body.to_string());

    if let Some(token) = session_token {
        req = req.header("X-Session-Token", token);
    }

    req.send().await.expect("Failed to send request")
}

fn now_ms() -> String {
    Utc::now().timestamp_millis().to_string()
}

fn parse_expiry(body: &Value) -> DateTime<Utc> {
    body["data"]["expiresAt"]
        .as_str()
        .unwrap()
        .parse::<DateTime<Utc>>()
        .unwrap()
}

const USER_CREDS: &str = r#"{"email":"user@x.com","password":"pw123456"}"#;

// ============================================================================
// Developer Tests
// ============================================================================

#[tokio::test]
async fn test_developer_register_and_login() {
    let base_url = spawn_test_server().await;
    let client = reqwest::Client::new();

    let token = register_developer(&client, &base_url, "a@x.com").await;
    assert!(!token.is_empty());

    // Wrong password
    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({"email": "a@x.com", "password": "wrong-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid credentials");

    // Correct password issues a token with a fresh expiry
    let before = Utc::now();
    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({"email": "a@x.com", "password": "pw123456"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let expires_at = parse_expiry(&body);
    assert!(expires_at > before + Duration::hours(23));
    assert!(expires_at <= Utc::now() + Duration::hours(24) + Duration::seconds(1));

    let new_token = body["data"]["token"].as_str().unwrap();
    let resp = client
        .get(format!("{}/api/auth/me", base_url))
        .bearer_auth(new_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["email"], "a@x.com");
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let base_url = spawn_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.headers()["referrer-policy"], "no-referrer");
    assert_eq!(resp.headers()["x-frame-options"], "DENY");
}

// ============================================================================
// Application Tests
// ============================================================================

#[tokio::test]
async fn test_application_keys_and_isolation() {
    let base_url = spawn_test_server().await;
    let client = reqwest::Client::new();

    let owner = register_developer(&client, &base_url, "owner@x.com").await;
    let other = register_developer(&client, &base_url, "other@x.com").await;

    let first = create_application(&client, &base_url, &owner, "First").await;
    let second = create_application(&client, &base_url, &owner, "Second").await;

    for keys in [&first, &second] {
        assert!(keys.public_key.starts_with("pk_"));
        assert!(keys.secret_key.starts_with("sk_"));
        assert!(keys.public_key.len() >= 3 + 32);
        assert!(keys.secret_key.len() >= 3 + 32);
    }
    assert_ne!(first.public_key, second.public_key);
    assert_ne!(first.secret_key, second.secret_key);

    // Another developer's token never reaches these applications
    let resp = client
        .get(format!("{}/api/applications/{}", base_url, first.id))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .delete(format!("{}/api/applications/{}", base_url, first.id))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{}/api/applications", base_url))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["count"], 2);
}

#[tokio::test]
async fn test_delete_application_revokes_its_sessions() {
    let base_url = spawn_test_server().await;
    let client = reqwest::Client::new();

    let token = register_developer(&client, &base_url, "dev@x.com").await;
    let app = create_application(&client, &base_url, &token, "Shop").await;

    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/register",
        &app.public_key,
        &app.secret_key,
        &now_ms(),
        None,
        USER_CREDS,
    )
    .await;
    assert_eq!(resp.status(), 201);

    let resp = client
        .delete(format!("{}/api/applications/{}", base_url, app.id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The keys no longer authenticate anything
    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/login",
        &app.public_key,
        &app.secret_key,
        &now_ms(),
        None,
        USER_CREDS,
    )
    .await;
    assert_eq!(resp.status(), 401);
}

// ============================================================================
// Signed Request Tests
// ============================================================================

#[tokio::test]
async fn test_signature_checks() {
    let base_url = spawn_test_server().await;
    let client = reqwest::Client::new();

    let token = register_developer(&client, &base_url, "dev@x.com").await;
    let app = create_application(&client, &base_url, &token, "Shop").await;

    // Wrong secret key
    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/register",
        &app.public_key,
        "sk_not_the_right_key",
        &now_ms(),
        None,
        USER_CREDS,
    )
    .await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");

    // Missing headers
    let resp = client
        .post(format!("{}/api/users/register", base_url))
        .header("Content-Type", "application/json")
        .body(USER_CREDS)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let missing: Value = resp.json().await.unwrap();
    assert_eq!(missing, body);

    // A timestamp from long ago is still accepted
    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/register",
        &app.public_key,
        &app.secret_key,
        "1000",
        None,
        USER_CREDS,
    )
    .await;
    assert_eq!(resp.status(), 201);
}

// ============================================================================
// End User Tests
// ============================================================================

#[tokio::test]
async fn test_end_user_session_lifecycle() {
    let base_url = spawn_test_server().await;
    let client = reqwest::Client::new();

    let token = register_developer(&client, &base_url, "dev@x.com").await;
    let app_a = create_application(&client, &base_url, &token, "A").await;
    let app_b = create_application(&client, &base_url, &token, "B").await;

    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/register",
        &app_a.public_key,
        &app_a.secret_key,
        &now_ms(),
        None,
        USER_CREDS,
    )
    .await;
    assert_eq!(resp.status(), 201);

    let before = Utc::now();
    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/login",
        &app_a.public_key,
        &app_a.secret_key,
        &now_ms(),
        None,
        USER_CREDS,
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let session = body["data"]["sessionToken"].as_str().unwrap().to_string();
    let expires_at = parse_expiry(&body);
    assert!(expires_at > before + Duration::hours(23));
    assert!(expires_at <= Utc::now() + Duration::hours(24) + Duration::seconds(1));

    // Valid under A
    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::GET,
        "/api/users/me",
        &app_a.public_key,
        &app_a.secret_key,
        &now_ms(),
        Some(session.as_str()),
        "",
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["email"], "user@x.com");
    assert_eq!(body["data"]["applicationId"], app_a.id.as_str());

    // Never valid under B
    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::GET,
        "/api/users/me",
        &app_b.public_key,
        &app_b.secret_key,
        &now_ms(),
        Some(session.as_str()),
        "",
    )
    .await;
    assert_eq!(resp.status(), 401);

    // Logout, then the token is dead
    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/logout",
        &app_a.public_key,
        &app_a.secret_key,
        &now_ms(),
        Some(session.as_str()),
        "",
    )
    .await;
    assert_eq!(resp.status(), 200);

    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::GET,
        "/api/users/me",
        &app_a.public_key,
        &app_a.secret_key,
        &now_ms(),
        Some(session.as_str()),
        "",
    )
    .await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_expired_session_rejected() {
    let mut config = Config::with_secret(JWT_SECRET);
    config.session_ttl_secs = 1;
    let base_url = spawn_server_with(config).await;
    let client = reqwest::Client::new();

    let token = register_developer(&client, &base_url, "dev@x.com").await;
    let app = create_application(&client, &base_url, &token, "Shop").await;

    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::POST,
        "/api/users/register",
        &app.public_key,
        &app.secret_key,
        &now_ms(),
        None,
        USER_CREDS,
    )
    .await;
    let body: Value = resp.json().await.unwrap();
    let session = body["data"]["sessionToken"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let resp = signed(
        &client,
        &base_url,
        reqwest::Method::GET,
        "/api/users/me",
        &app.public_key,
        &app.secret_key,
        &now_ms(),
        Some(session.as_str()),
        "",
    )
    .await;
    assert_eq!(resp.status(), 401);
}
