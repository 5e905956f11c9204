//! tenantgate entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Select the store (Redis when `REDIS_URL` is set, in-memory otherwise)
//! 3. Build router with API routes, CORS, and security headers
//! 4. Start Axum server
//!
//! Also supports a `sign` subcommand that prints the request signature an
//! application backend must send.

use std::sync::Arc;
use tenantgate::{
    auth::{middleware::AppState, signature::sign_request},
    config::Config,
    storage::{MemoryStore, RedisStore, Store},
};

fn print_sign_usage() {
    eprintln!("Usage: tenantgate sign <secret_key> <timestamp> <method> <path> [body]");
    eprintln!();
    eprintln!("Print the X-Signature value for a request to the end-user API.");
    eprintln!();
    eprintln!("Example:");
    eprintln!(
        "  tenantgate sign sk_... 1700000000000 POST /api/users/login \
         '{{\"email\":\"u@x.com\",\"password\":\"pw123456\"}}'"
    );
}

/// Handle `tenantgate sign ...`. Returns the process exit code.
fn run_sign(args: &[String]) -> i32 {
    if args.len() < 4 || args.len() > 5 {
        print_sign_usage();
        return 1;
    }
    let body = args.get(4).map(String::as_str).unwrap_or("");

    match sign_request(&args[0], &args[1], &args[2], &args[3], body.as_bytes()) {
        Ok(signature) => {
            println!("{}", signature);
            0
        }
        Err(e) => {
            eprintln!("Error signing request: {}", e);
            1
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::open(url)?;
            // Fail fast on an unreachable backend
            store.ping().await?;
            tracing::info!("Using Redis store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("REDIS_URL not set; using in-memory store (data is lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    tracing::info!("Starting tenantgate on {}", config.bind_addr);

    let store = open_store(&config).await?;
    let bind_addr = config.bind_addr;
    let app = tenantgate::app(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Check for sign subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "sign" {
        std::process::exit(run_sign(&args[2..]));
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = serve().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}
