//! Schedule CRUD: GET/POST /schedules, PUT/DELETE /schedules/{id}.
//!
//! Every write is followed by a targeted reconciliation so the trigger table
//! tracks the store; the pair runs under `AppState::schedule_writes`. A
//! record the reconciler rejects stays persisted and the response carries the
//! rejection as a warning instead of trigger keys.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use cadenza_core::RecordId;
use cadenza_scheduler::TriggerKey;
use cadenza_store::{NewSchedule, Schedule, StoreError};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{api_error, ApiError};
use crate::app::AppState;

#[derive(Serialize)]
pub struct Warning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub schedule: Schedule,
    pub triggers: Vec<TriggerKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<Warning>,
}

/// GET /schedules
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let schedules = state.store.list().map_err(store_error)?;
    Ok(Json(json!({ "schedules": schedules })))
}

/// POST /schedules
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewSchedule>,
) -> Result<(StatusCode, Json<ScheduleResponse>), ApiError> {
    let _guard = state.schedule_writes.lock().await;
    let schedule = state.store.create(&body).map_err(store_error)?;
    info!(id = %schedule.id(), "schedule created via http");
    Ok((StatusCode::CREATED, Json(apply(&state, schedule))))
}

/// PUT /schedules/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<NewSchedule>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let _guard = state.schedule_writes.lock().await;
    let schedule = state
        .store
        .update(RecordId(id), &body)
        .map_err(store_error)?;
    info!(id, "schedule updated via http");
    Ok(Json(apply(&state, schedule)))
}

/// DELETE /schedules/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let id = RecordId(id);
    let _guard = state.schedule_writes.lock().await;
    state.store.delete(id).map_err(store_error)?;
    let removed = state.reconciler.remove_record(id);
    info!(%id, removed = removed.len(), "schedule deleted via http");
    Ok(Json(json!({ "ok": true, "removed": removed })))
}

fn apply(state: &AppState, schedule: Schedule) -> ScheduleResponse {
    match state.reconciler.apply_record(&schedule.record) {
        Ok(triggers) => ScheduleResponse {
            schedule,
            triggers,
            warning: None,
        },
        Err(e) => {
            warn!(id = %schedule.id(), error = %e, "schedule saved without triggers");
            ScheduleResponse {
                schedule,
                triggers: Vec::new(),
                warning: Some(Warning {
                    code: e.code(),
                    message: e.to_string(),
                }),
            }
        }
    }
}

fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Database(_) => {
            error!(error = %e, "schedule store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.code(), &e)
}
