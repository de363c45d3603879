//! Streamlabs Donation Relay
//!
//! Single-binary Rust service that:
//! 1. Accepts the Streamlabs OAuth redirect and exchanges the code for a token
//! 2. Keeps that token current from a token source on a timer
//! 3. Polls the Streamlabs donations API with it on a separate timer
//! 4. Pushes every donation to all connected WebSocket subscribers

mod config;
mod error;
mod metrics;
mod oauth;
mod ws;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use donation_relay::{Broadcaster, HttpDonationSource, spawn_poll_task, spawn_refresh_task};
use metrics_exporter_prometheus::PrometheusHandle;
use streamlabs_auth::{HttpTokenSource, OAuthExchanger, TokenStore};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::oauth::OAuthState;

/// How long in-flight HTTP requests get to finish after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the health and metrics handlers
#[derive(Clone)]
struct AppState {
    store: Arc<TokenStore>,
    broadcaster: Arc<Broadcaster>,
    oauth: OAuthState,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// CORS policy: listed origins only, GET/POST, credentials allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, cors_origins: &[String], max_connections: usize) -> Router {
    let oauth = oauth::build_oauth_router(state.oauth.clone());
    let ws = ws::build_ws_router(state.broadcaster.clone());

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(oauth)
        .merge(ws)
        .layer(cors_layer(cors_origins))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting streamlabs-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        frontend_url = %config.server.frontend_url,
        donations_url = %config.relay.donations_url,
        token_source_url = %config.relay.token_source_url,
        poll_interval_secs = config.relay.poll_interval_secs,
        refresh_interval_secs = config.relay.refresh_interval_secs,
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(config.relay.http_timeout())
        .build()
        .context("failed to build HTTP client")?;

    let store = Arc::new(TokenStore::new());
    let exchanger = Arc::new(OAuthExchanger::new(
        http.clone(),
        config.oauth_client()?,
        store.clone(),
    ));
    let broadcaster = Arc::new(Broadcaster::new(config.relay.send_timeout()));

    let listen_addr = config.server.listen_addr;
    let listener = match TcpListener::bind(listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %listen_addr, error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };

    let refresh_task = spawn_refresh_task(
        store.clone(),
        Arc::new(HttpTokenSource::new(
            http.clone(),
            config.relay.token_source_url.clone(),
        )),
        config.relay.refresh_interval(),
    );
    let poll_task = spawn_poll_task(
        store.clone(),
        Arc::new(HttpDonationSource::new(
            http,
            config.relay.donations_url.clone(),
        )),
        broadcaster.clone(),
        config.relay.poll_interval(),
    );

    let app_state = AppState {
        store,
        broadcaster,
        oauth: OAuthState::new(exchanger, &config.server.frontend_url),
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };
    let app = build_router(
        app_state,
        &config.cors_origins(),
        config.server.max_connections,
    );

    info!(addr = %listen_addr, "accepting OAuth callbacks and WebSocket subscribers");

    // Graceful shutdown with drain timeout enforcement:
    // 1. shutdown_signal() fires on SIGTERM/SIGINT
    // 2. axum stops accepting new connections and drains in-flight requests
    // 3. DRAIN_TIMEOUT bounds the drain so a slow client cannot block exit
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    // Periodic tasks just stop; in-flight polls are not awaited
    refresh_task.abort();
    poll_task.abort();

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: token presence, subscriber count, uptime.
/// Always 200; `awaiting_login` until the first OAuth callback succeeds.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let has_token = state.store.is_present().await;
    let body = serde_json::json!({
        "status": if has_token { "healthy" } else { "awaiting_login" },
        "token": if has_token { "present" } else { "absent" },
        "subscribers": state.broadcaster.len().await,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
