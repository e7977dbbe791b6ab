// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use modelmux_core::MuxError;
use modelmux_router::RoutingService;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;

/// State for the health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Wall-clock start, advertised as the model's `created` time.
    pub started_at: DateTime<Utc>,
    /// Prometheus render function, when the exporter is installed.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Self {
        Self {
            start_time: Instant::now(),
            started_at: Utc::now(),
            prometheus_render,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<RoutingService>,
    pub health: HealthState,
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl From<&modelmux_config::ServerConfig> for ServerConfig {
    fn from(config: &modelmux_config::ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Builds the application router:
/// - POST /v1/chat/completions
/// - GET /v1/models
/// - GET /health
/// - GET /metrics
/// - GET /metrics/prometheus
pub fn build_router(state: GatewayState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(handlers::post_chat_completions))
        .route("/v1/models", get(handlers::get_models))
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route("/metrics/prometheus", get(handlers::get_prometheus))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds to host:port and serves until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), MuxError> {
    let app = build_router(state, config.max_body_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MuxError::Server {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| MuxError::Server {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
