//! HTTP and WebSocket surfaces.

pub mod commands;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Command ingestion: `POST /fly` plus a health check.
pub fn command_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fly", post(commands::fly))
        .route("/health", get(|| async { "OK" }))
}

/// Realtime telemetry stream: `GET /ws`.
pub fn stream_routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws::ws_handler))
}
