use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::metrics::Metrics;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub terminal_connected: bool,
    pub sink_connected: bool,
}

/// Shared state for health endpoints
#[derive(Clone)]
pub struct ServerState {
    pub terminal_connected: Arc<AtomicBool>,
    pub sink_connected: Arc<AtomicBool>,
    pub metrics: Arc<Metrics>,
}

impl ServerState {
    pub fn new(
        terminal_connected: Arc<AtomicBool>,
        sink_connected: Arc<AtomicBool>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            terminal_connected,
            sink_connected,
            metrics,
        }
    }
}

/// Health endpoint - always returns 200 if server is running
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        terminal_connected: state.terminal_connected.load(Ordering::SeqCst),
        sink_connected: state.sink_connected.load(Ordering::SeqCst),
    })
}

/// Ready endpoint - returns 200 only when both connectors are up
async fn ready(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let terminal_connected = state.terminal_connected.load(Ordering::SeqCst);
    let sink_connected = state.sink_connected.load(Ordering::SeqCst);
    let ready = terminal_connected && sink_connected;

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if ready { "ready" } else { "not_ready" }.to_string(),
            terminal_connected,
            sink_connected,
        }),
    )
}

/// Metrics endpoint - Prometheus text format
async fn metrics(State(state): State<ServerState>) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Create the health server router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server
pub async fn run_server(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
