//! Direct query execution, bypassing generation

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
use crate::query_engine::DirectQueryResponse;
use crate::shared_state::UnifiedAppState;

#[derive(Debug, Deserialize, Validate)]
pub struct DirectQueryRequest {
    #[validate(length(min = 1))]
    pub query: String,
    #[serde(default)]
    pub validate_only: bool,
}

pub async fn execute_query(
    State(state): State<UnifiedAppState>,
    Json(req): Json<DirectQueryRequest>,
) -> Result<Json<DirectQueryResponse>, Response> {
    if let Err(e) = req.validate() {
        warn!("Rejected query request: {}", e);
        return Err(error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {}", e)));
    }

    let response = state
        .orchestrator
        .execute_direct(&req.query, req.validate_only)
        .await;

    info!(
        "Direct query handled (safe: {}, validate_only: {}, error: {})",
        response.is_safe,
        req.validate_only,
        response.error.is_some()
    );
    Ok(Json(response))
}
