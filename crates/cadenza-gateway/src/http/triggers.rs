//! GET /triggers: the live trigger table.

use axum::{extract::State, Json};
use cadenza_scheduler::Trigger;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct TriggerView {
    #[serde(flatten)]
    pub trigger: Trigger,
    /// Local wall-clock time of the next fire.
    pub next_fire: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct TriggerList {
    pub triggers: Vec<TriggerView>,
}

pub async fn list_handler(State(state): State<Arc<AppState>>) -> Json<TriggerList> {
    let now = Local::now().naive_local();
    let triggers = state
        .reconciler
        .table()
        .snapshot()
        .into_iter()
        .map(|trigger| TriggerView {
            next_fire: trigger.spec.next_fire_after(now),
            trigger,
        })
        .collect();
    Json(TriggerList { triggers })
}
