//! Command ingestion endpoint.

use axum::{extract::State, http::StatusCode, Json};
use drone_core::TrajectoryCommand;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Response after a command is queued.
#[derive(Debug, Serialize)]
pub struct FlyResponse {
    pub command_id: String,
    pub path: String,
    pub status: String,
}

/// Queue a trajectory command.
/// POST /fly
///
/// Waits while the command queue is full. With a submit timeout configured,
/// a queue that stays full answers 503 and the command is not queued.
pub async fn fly(
    State(state): State<Arc<AppState>>,
    Json(command): Json<TrajectoryCommand>,
) -> Result<Json<FlyResponse>, StatusCode> {
    let command_id = uuid::Uuid::new_v4().to_string();
    let path = command.path_type;

    let submit = state.commands.submit(command);
    let submitted = match state.submit_timeout {
        Some(limit) => match tokio::time::timeout(limit, submit).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Command queue full for {:?}, rejecting {} command", limit, path);
                return Err(StatusCode::SERVICE_UNAVAILABLE);
            }
        },
        None => submit.await,
    };

    if let Err(err) = submitted {
        tracing::error!("Command {} dropped: {}", command_id, err);
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    tracing::info!("Queued {} command {}", path, command_id);

    Ok(Json(FlyResponse {
        command_id,
        path: path.to_string(),
        status: "queued".to_string(),
    }))
}
