pub mod health;
pub mod outlets;
pub mod player;
pub mod schedules;
pub mod triggers;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

/// Error half of every handler's return type.
pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, code: &str, message: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(json!({ "error": message.to_string(), "code": code })),
    )
}
