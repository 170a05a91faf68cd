//! Axum-based HTTP gateway.
//!
//! All requests go through one fallback handler ([`dispatch::dispatch`]) that
//! routes on a static `(resource, method)` table. Tower layers add:
//! - Request body size limits (64KB max)
//! - Request timeouts (30s)
//! - Permissive CORS that admits the `token` header

pub mod dispatch;
pub mod tokens;
pub mod users;

use crate::auth::{PasswordHasher, TokenService};
use crate::config::{AuthConfig, Config};
use crate::store::{self, ObjectStore};
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, Method, StatusCode},
    Router,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub hasher: PasswordHasher,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, auth: &AuthConfig) -> Self {
        let hasher = PasswordHasher::new(&auth.hashing_secret);
        let tokens = TokenService::from_config(Arc::clone(&store), hasher.clone(), auth);
        Self {
            store,
            hasher,
            tokens,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(
            Arc::new(crate::store::MemoryStore::new()),
            &AuthConfig::default(),
        )
    }
}

/// Build the application router with middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(users::TOKEN_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .fallback(dispatch::dispatch)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// True unless `host` is a loopback name or address.
pub fn is_public_bind(host: &str) -> bool {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return false;
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => !ip.is_loopback(),
        Err(_) => true,
    }
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    config.validate()?;

    let host = config.gateway.host.as_str();
    let port = config.gateway.port;
    if is_public_bind(host) && !config.gateway.allow_public_bind {
        anyhow::bail!(
            "Refusing to bind to {host}: the API would be reachable from other machines.\n\
             Use --host 127.0.0.1 (default) or set [gateway] allow_public_bind = true."
        );
    }

    let store = store::create_store(&config.storage)?;
    let state = AppState::new(store, &config.auth);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Listening on http://{local_addr}");

    let sweeper = (config.auth.sweep_interval_secs > 0).then(|| {
        spawn_token_sweep(
            state.tokens.clone(),
            Duration::from_secs(config.auth.sweep_interval_secs),
        )
    });

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("Gateway stopped");
    Ok(())
}

/// Periodically delete expired tokens.
pub fn spawn_token_sweep(tokens: TokenService, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            match tokens.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Expired tokens purged"),
                Err(e) => tracing::warn!("Token sweep failed: {e}"),
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
