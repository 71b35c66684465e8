use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub websocket_connections: usize,
    pub players_in_world: usize,
}

/// GET /health: liveness plus connection and roster counts.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        websocket_connections: state.ws_connection_count.load(Ordering::Relaxed),
        players_in_world: state.snapshot.borrow().roster.len(),
    })
}

/// GET /health/ready: ready while the round loop accepts commands.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.commands.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "not ready: round loop stopped");
    }
    (StatusCode::OK, "ready")
}
