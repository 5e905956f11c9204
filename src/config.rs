use crate::auth::MAX_TTL_SECS;
use std::env;
use std::net::SocketAddr;

/// Minimum length of the bearer token signing secret.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

#[derive(Clone)]
pub struct Config {
    // Bearer tokens
    pub jwt_secret: String,

    // Storage; None selects the in-memory store
    pub redis_url: Option<String>,

    // Server
    pub bind_addr: SocketAddr,

    // Limits
    pub max_body_bytes: usize,

    // TTLs (in seconds)
    pub token_ttl_secs: u64,
    pub session_ttl_secs: u64,

    // CORS; a single "*" allows any origin
    pub cors_allowed_origins: Vec<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("bind_addr", &self.bind_addr)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Configuration with every optional setting at its default.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Config {
            jwt_secret: jwt_secret.into(),
            redis_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_body_bytes: 1_048_576,
            token_ttl_secs: 86_400,
            session_ttl_secs: 86_400,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;

        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {} bytes", MIN_JWT_SECRET_BYTES),
            ));
        }

        let defaults = Config::with_secret(jwt_secret);

        // Storage
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty());

        // Server
        let bind_addr = match env::var("BIND_ADDR") {
            Ok(addr) => addr
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?,
            Err(_) => defaults.bind_addr,
        };

        // Limits
        let max_body_bytes = parse_env_or_default("MAX_BODY_BYTES", defaults.max_body_bytes)?;
        if max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_BODY_BYTES".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        // TTLs
        let token_ttl_secs = parse_ttl("TOKEN_TTL_SECS", defaults.token_ttl_secs)?;
        let session_ttl_secs = parse_ttl("SESSION_TTL_SECS", defaults.session_ttl_secs)?;

        // CORS
        let cors_allowed_origins = match env::var("CORS_ALLOWED_ORIGINS") {
            Ok(origins) => {
                let origins: Vec<String> = origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if origins.is_empty() {
                    defaults.cors_allowed_origins.clone()
                } else {
                    origins
                }
            }
            Err(_) => defaults.cors_allowed_origins.clone(),
        };

        Ok(Config {
            redis_url,
            bind_addr,
            max_body_bytes,
            token_ttl_secs,
            session_ttl_secs,
            cors_allowed_origins,
            ..defaults
        })
    }

    /// True when any origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == "*")
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

/// Parse a lifetime in seconds, bounded to `1..=MAX_TTL_SECS`.
fn parse_ttl(key: &str, default: u64) -> Result<u64, ConfigError> {
    let secs: u64 = parse_env_or_default(key, default)?;
    if secs == 0 || secs > MAX_TTL_SECS {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be between 1 and {} seconds", MAX_TTL_SECS),
        ));
    }
    Ok(secs)
}
