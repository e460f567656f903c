//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared [`AppState`] from configuration
//! - Create the Axum router for `/api/users`
//! - Wire up middleware (request ID, tracing, timeout, auth gate, body limit)
//! - Rate limit the login route
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{authenticate, AuthGate, TokenConfigError, TokenService};
use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::lifecycle::shutdown;
use crate::security::rate_limit::{login_rate_limit, RateLimiter};
use crate::security::upload::FileValidator;
use crate::service::{AuthService, UserService};
use crate::store::{AvatarStore, CredentialHasher, IdentityStore};

/// Room for multipart framing and the `user` part on top of the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub gate: AuthGate,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire services around the given collaborators.
    pub fn from_config(
        config: &ServiceConfig,
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self, TokenConfigError> {
        let tokens = Arc::new(TokenService::from_config(&config.token)?);

        let auth = AuthService::new(store.clone(), hasher.clone(), tokens.clone());
        let users = UserService::new(
            store.clone(),
            hasher,
            FileValidator::from_config(&config.upload),
            AvatarStore::from_config(&config.upload),
        );

        Ok(Self {
            auth: Arc::new(auth),
            users: Arc::new(users),
            gate: AuthGate::new(tokens, store),
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
        })
    }
}

/// HTTP server for the user service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    pub fn new(config: ServiceConfig, state: AppState) -> Self {
        let limiter = state.limiter.clone();
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let login = Router::new()
            .route("/login", post(handlers::login))
            .route_layer(middleware::from_fn_with_state(
                state.limiter.clone(),
                login_rate_limit,
            ));

        let users = Router::new()
            .route("/register", post(handlers::register))
            .route(
                "/profile",
                get(handlers::get_profile).put(handlers::update_profile),
            )
            .route("/profile/avatar", put(handlers::update_avatar))
            .merge(login);

        Router::new()
            .nest("/api/users", users)
            .layer(DefaultBodyLimit::max(config.upload.max_bytes + MULTIPART_OVERHEAD))
            .layer(middleware::from_fn_with_state(state.gate.clone(), authenticate))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let idle_secs = self.config.rate_limit.idle_eviction_secs;
        if idle_secs > 0 {
            spawn_bucket_sweeper(
                self.limiter.clone(),
                Duration::from_secs(idle_secs),
                shutdown_rx.resubscribe(),
            );
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Periodically drop buckets idle for longer than `idle`.
fn spawn_bucket_sweeper(
    limiter: Arc<RateLimiter>,
    idle: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(idle);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    limiter.sweep_idle(Instant::now(), idle);
                }
                _ = shutdown_rx.recv() => break,
            }
        }
        tracing::debug!("Bucket sweeper stopped");
    });
}
