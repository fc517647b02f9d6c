//! API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;
use crate::ws;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/mcp/request", post(handlers::handle_request))
        .route("/api/mcp/stream", post(handlers::handle_stream))
        .route("/api/mcp/sse-stream", post(handlers::handle_sse_stream))
        .route("/api/mcp/operations", get(handlers::list_operations))
        .route("/api/mcp/health", get(handlers::health))
        .route("/ws/mcp", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
