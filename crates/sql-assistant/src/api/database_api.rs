//! Database description and health checks

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::api::error_response;
use crate::database::{Relationship, SchemaProvider, TableInfo};
use crate::shared_state::UnifiedAppState;

#[derive(Debug, Serialize)]
pub struct DatabaseInfoResponse {
    pub tables: Vec<TableInfo>,
    pub relationships: Vec<Relationship>,
    pub connection_status: String,
    pub max_result_rows: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database_connected: bool,
    pub timestamp: DateTime<Utc>,
}

pub async fn database_info(
    State(state): State<UnifiedAppState>,
) -> Result<Json<DatabaseInfoResponse>, Response> {
    match state.database.fetch_schema().await {
        Ok(schema) => Ok(Json(DatabaseInfoResponse {
            tables: schema.tables,
            relationships: schema.relationships,
            connection_status: "connected".to_string(),
            max_result_rows: state.database.max_result_rows(),
        })),
        Err(e) => {
            error!("Failed to get database info: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get database info: {}", e),
            ))
        }
    }
}

pub async fn health(State(state): State<UnifiedAppState>) -> Json<HealthResponse> {
    let database = state.database.clone();
    let database_connected = tokio::task::spawn_blocking(move || database.test_connection())
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: if database_connected { "healthy" } else { "unhealthy" }.to_string(),
        database_connected,
        timestamp: Utc::now(),
    })
}
