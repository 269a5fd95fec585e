//! Session history endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::memory::ConversationTurn;
use crate::shared_state::UnifiedAppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<ConversationTurn>,
}

pub async fn get_history(
    State(state): State<UnifiedAppState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let history = state.orchestrator.get_history(&session_id);
    info!("Fetched {} turn(s) for session {}", history.len(), session_id);
    Json(HistoryResponse { session_id, history })
}

pub async fn clear_history(
    State(state): State<UnifiedAppState>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    state.orchestrator.clear_history(&session_id);
    Json(json!({ "message": "Chat history cleared" }))
}
