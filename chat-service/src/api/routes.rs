//! API route definitions.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat/message", post(handlers::send_message))
        .route(
            "/api/chat/conversation/{conversation_id}/history",
            get(handlers::get_history),
        )
        .route(
            "/api/chat/conversation/{conversation_id}",
            delete(handlers::clear_conversation),
        )
        .route("/api/chat/conversations", get(handlers::list_conversations))
        .route("/api/chat/health", get(handlers::health))
        .route("/api/chat/capabilities", get(handlers::capabilities))
        .route("/api/chat/ping", get(handlers::ping))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
