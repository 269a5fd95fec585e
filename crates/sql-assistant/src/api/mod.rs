// sql-assistant/crates/sql-assistant/src/api/mod.rs
//! API module - HTTP handlers over the chat pipeline

pub mod chat_api;
pub mod history_api;
pub mod query_api;
pub mod database_api;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

// Re-export API handlers
pub use chat_api::{chat, ChatRequest};
pub use history_api::{clear_history, get_history, HistoryResponse};
pub use query_api::{execute_query, DirectQueryRequest};
pub use database_api::{database_info, health, DatabaseInfoResponse, HealthResponse};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}
