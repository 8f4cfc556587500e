//! WebAPI - REST and WebSocket endpoints
//!
//! ## Responsibilities
//!
//! - Stream session control per camera
//! - Camera catalog maintenance
//! - Workflow validate / compile / execute
//! - Realtime channel subscription over WebSocket

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        cameras: state.catalog.len().await,
        active_sessions: state.sessions.active_count().await,
        workers: state.pool.status(),
        realtime_channels: state.realtime.channel_count(),
    };

    Json(response)
}
