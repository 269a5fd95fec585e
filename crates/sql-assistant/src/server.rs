//! HTTP server startup
//!
//! All handlers share one `UnifiedAppState`; the only outbound network call per chat
//! request is to the language model backend.

use std::time::Duration;
use tracing::{info, warn};

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
};

use crate::{config::Config, metrics, shared_state::UnifiedAppState};

/// Run the HTTP API until the process is stopped
pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::telemetry::init_tracing(&cfg.log_level);
    metrics::init_metrics();
    cfg.print_config();

    let state = UnifiedAppState::from_config(&cfg)?;
    if !state.database.test_connection() {
        warn!("Database connection test failed; /health will report unhealthy");
    }

    // Generation and execution can each use their full timeout
    let request_timeout = Duration::from_secs(cfg.generate_timeout_seconds + cfg.query_timeout_seconds + 5);
    let app = build_router(state, request_timeout);

    let addr = cfg.api_addr()?;
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: UnifiedAppState, request_timeout: Duration) -> axum::Router {
    use axum::{
        Router,
        routing::{get, post},
    };
    use tower::ServiceBuilder;
    use tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
        timeout::TimeoutLayer,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(crate::api::chat))
        .route(
            "/chat/history/:session_id",
            get(crate::api::get_history).delete(crate::api::clear_history),
        )
        .route("/query/execute", post(crate::api::execute_query))
        .route("/database/info", get(crate::api::database_info))
        .route("/health", get(crate::api::health))
        .route("/metrics", get(metrics::get_metrics))
        .route_layer(middleware::from_fn(track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors),
        )
        .with_state(state)
}

/// Count every routed request by its route template and status
async fn track_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;
    metrics::inc_request(&route, response.status().as_str());
    response
}
