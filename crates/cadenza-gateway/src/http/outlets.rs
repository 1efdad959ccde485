//! POST /outlets/{index}/on and POST /outlets/{index}/off.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::{api_error, ApiError};
use crate::app::AppState;
use crate::outlet::OutletError;

pub async fn on_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<Value>, ApiError> {
    state.outlets.turn_on(index).map_err(outlet_error)?;
    Ok(Json(json!({ "ok": true, "index": index, "on": true })))
}

pub async fn off_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<Value>, ApiError> {
    state.outlets.turn_off(index).map_err(outlet_error)?;
    Ok(Json(json!({ "ok": true, "index": index, "on": false })))
}

fn outlet_error(e: OutletError) -> ApiError {
    warn!(error = %e, "outlet request rejected");
    match e {
        OutletError::UnknownDevice { .. } => api_error(StatusCode::NOT_FOUND, e.code(), &e),
    }
}
