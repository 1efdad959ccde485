use axum::{extract::State, Json};
use cadenza_player::PlayerStatus;
use std::sync::Arc;

use crate::app::AppState;

/// GET /player: session state, process id and the last recorded failure.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<PlayerStatus> {
    Json(state.player.status().await)
}
