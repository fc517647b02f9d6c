//! Chat API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{ChatMessage, ChatRequest, ChatResponse};

/// POST /api/chat/message
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    info!(chars = request.message.len(), "received chat message");
    let response = state
        .chat
        .process_chat(request)
        .await
        .map_err(|err| ApiError::Internal(format!("Failed to process chat message: {err}")))?;
    Ok(Json(response))
}

/// GET /api/chat/conversation/{conversation_id}/history
pub async fn get_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Json<Vec<ChatMessage>> {
    info!(%conversation_id, "getting conversation history");
    Json(state.store.history(&conversation_id))
}

/// DELETE /api/chat/conversation/{conversation_id}
pub async fn clear_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Json<serde_json::Value> {
    info!(%conversation_id, "clearing conversation");
    state.store.clear(&conversation_id);
    Json(json!({
        "message": "Conversation cleared successfully",
        "conversation_id": conversation_id,
    }))
}

/// GET /api/chat/conversations
pub async fn list_conversations(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "conversations": state.store.conversation_ids(),
        "count": state.store.count(),
    }))
}

/// GET /api/chat/health
///
/// Aggregates model-endpoint and operations-service health; answers 503
/// when either is down.
pub async fn health(State(state): State<AppState>) -> Response {
    let (healthy, body) = state.chat.service_health().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /api/chat/capabilities
pub async fn capabilities(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.chat.capabilities().await)
}

/// GET /api/chat/ping
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Chat service is running",
        "timestamp": Utc::now().timestamp_millis(),
        "service": "chat-service",
    }))
}
