//! CRM Account Portal
//!
//! Single-binary Rust service that:
//! 1. Logs the browser in through the CRM's OAuth2 authorization-code flow
//! 2. Keeps the resulting token in an encrypted session cookie
//! 3. Lists, shows and edits accounts through the CRM REST API
//! 4. Exposes /health and Prometheus /metrics

mod config;
mod error;
mod gate;
mod lifecycle;
mod metrics;
mod pages;
mod portal;
mod session;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use force_api::ForceClient;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::pages::Pages;
use crate::portal::PortalState;
use crate::session::SessionSettings;

/// Drain timeout duration (graceful shutdown <5s)
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state for the operational endpoints
#[derive(Clone)]
struct AppState {
    portal: PortalState,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Every request runs through the request-tracking middleware, and a
/// concurrency limit layer caps in-flight requests at `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let portal = portal::router(state.portal.clone());

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(portal)
        .layer(axum::middleware::from_fn(metrics::track))
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

    info!("starting account-portal");

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
        login_url = %config.crm.login_url,
        api_version = %config.crm.api_version,
        public_url = config.server.public_url.as_deref().unwrap_or("<per request>"),
        "configuration loaded"
    );

    let oauth = config.oauth().context("invalid consumer configuration")?;
    let session =
        SessionSettings::from_config(&config.session).context("invalid session configuration")?;
    let pages = Pages::new().context("failed to load page templates")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.crm.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let portal_state = PortalState {
        crm: ForceClient::new(http.clone(), config.crm.api_version.clone()),
        http,
        oauth: Arc::new(oauth),
        pages: Arc::new(pages),
        session,
        public_url: config.server.public_url.clone(),
    };

    let app_state = AppState {
        portal: portal_state,
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts: notify the server to drain, then race the drain against
    // the timeout.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // Wait for the OS signal
    shutdown_signal().await;

    // Signal the server to begin draining
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

/// Health endpoint: process liveness and uptime. Does not call the CRM.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
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
