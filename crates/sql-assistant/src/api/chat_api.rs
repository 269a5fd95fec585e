//! Chat endpoint: one message through the full pipeline

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::api::error_response;
use crate::query_engine::ChatResponse;
use crate::shared_state::UnifiedAppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
    #[serde(default = "default_session_id")]
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,
}

fn default_session_id() -> String {
    "default".to_string()
}

/// Pipeline failures come back inside the `ChatResponse`; only malformed requests are rejected
pub async fn chat(
    State(state): State<UnifiedAppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, Response> {
    if let Err(e) = req.validate() {
        warn!("Rejected chat request: {}", e);
        return Err(error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {}", e)));
    }

    info!(
        "Chat request for session {} ({} chars)",
        req.session_id,
        req.message.chars().count()
    );

    let response = state
        .orchestrator
        .handle_message(&req.session_id, &req.message)
        .await;

    Ok(Json(response))
}
