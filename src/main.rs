//! User identity service.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ timeout ─▶ auth gate ─┐
//!                                                                   │
//!                      ┌────────────────────────────────────────────┘
//!                      ▼
//!               /api/users router
//!                 ├─ POST /login ──▶ rate limiter ─▶ AuthService ─▶ TokenService
//!                 ├─ POST /register ─────────────▶ UserService ─▶ FileValidator
//!                 └─ /profile[/avatar] ──────────▶ UserService ─▶ AvatarStore
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use user_service::config::loader::{default_config, load_config};
use user_service::http::{AppState, HttpServer};
use user_service::lifecycle::{signals, Shutdown};
use user_service::observability::{logging, metrics};
use user_service::store::{Argon2Hasher, MemoryIdentityStore};

#[derive(Parser, Debug)]
#[command(name = "user-service", version, about = "User identity service")]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init(&config.observability);

    tracing::info!("user-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        token_ttl_secs = config.token.ttl_secs,
        rate_limit_capacity = config.rate_limit.capacity,
        upload_dir = %config.upload.dir,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = AppState::from_config(
        &config,
        Arc::new(MemoryIdentityStore::new()),
        Arc::new(Argon2Hasher::new()),
    )?;

    let shutdown = Arc::new(Shutdown::new());
    let shutdown_rx = shutdown.subscribe();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { signals::forward_to(&shutdown).await });
    }

    let server = HttpServer::new(config, state);
    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
