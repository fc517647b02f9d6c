//! Transport handlers: unary, NDJSON streaming, SSE streaming, discovery
//! and health.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::rejection::JsonRejection,
    extract::State,
    http::header,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    Json,
};
use mcp_protocol::{ErrorCode, McpError, McpMessage, McpRequest};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::AppState;
use crate::ops;

/// POST /api/mcp/request
///
/// One request envelope in, one response-or-error envelope out. Streaming
/// requests receive the historical "stream initiated" placeholder and
/// nothing further; callers wanting chunks use the streaming transports.
pub async fn handle_request(
    State(state): State<AppState>,
    payload: Result<Json<McpRequest>, JsonRejection>,
) -> Json<McpMessage> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return Json(McpMessage::Error(parse_failure(rejection))),
    };

    info!(operation = %request.operation, stream = request.stream, "received request");
    Json(ops::respond_unary(&state.config, &request).await)
}

/// POST /api/mcp/stream
///
/// Newline-delimited envelope sequence ending in a chunk with
/// `is_final = true` (or a single in-band error envelope).
pub async fn handle_stream(
    State(state): State<AppState>,
    payload: Result<Json<McpRequest>, JsonRejection>,
) -> Response {
    let stream = envelope_stream(&state, payload);

    let lines = stream.filter_map(|message| match serde_json::to_string(&message) {
        Ok(line) => Some(Ok::<_, Infallible>(format!("{line}\n"))),
        Err(err) => {
            warn!(%err, "failed to serialize stream envelope");
            None
        }
    });

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}

/// POST /api/mcp/sse-stream
///
/// The same envelope sequence framed as named server-sent events.
pub async fn handle_sse_stream(
    State(state): State<AppState>,
    payload: Result<Json<McpRequest>, JsonRejection>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = envelope_stream(&state, payload);

    let events = stream.filter_map(|message| {
        let name = sse_event_name(&message);
        match serde_json::to_string(&message) {
            Ok(data) => Some(Ok(Event::default()
                .event(name)
                .id(message.id().to_string())
                .data(data))),
            Err(err) => {
                warn!(%err, "failed to serialize SSE envelope");
                None
            }
        }
    });

    Sse::new(events)
}

/// GET /api/mcp/operations
pub async fn list_operations() -> Json<serde_json::Value> {
    Json(json!({ "operations": ops::operation_catalog() }))
}

/// GET /api/mcp/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "UP",
        "service": "MCP Operations Service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn envelope_stream(
    state: &AppState,
    payload: Result<Json<McpRequest>, JsonRejection>,
) -> ReceiverStream<McpMessage> {
    match payload {
        Ok(Json(request)) => {
            info!(operation = %request.operation, "received streaming request");
            ops::stream_operation(state.config.clone(), request)
        }
        Err(rejection) => ops::single_message_stream(McpMessage::Error(parse_failure(rejection))),
    }
}

fn parse_failure(rejection: JsonRejection) -> McpError {
    McpError::new(
        None,
        ErrorCode::RequestError,
        format!("Malformed request envelope: {rejection}"),
    )
}

fn sse_event_name(message: &McpMessage) -> &'static str {
    match message {
        McpMessage::Response(_) => "response",
        McpMessage::StreamChunk(chunk) if chunk.is_final => "stream-complete",
        McpMessage::StreamChunk(_) => "stream-chunk",
        McpMessage::Error(_) => "error",
        McpMessage::Request(_) => "message",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::McpStreamChunk;

    #[test]
    fn test_sse_event_names() {
        let chunk = McpMessage::StreamChunk(McpStreamChunk::new("r", 1, json!("data")));
        assert_eq!(sse_event_name(&chunk), "stream-chunk");

        let terminal = McpMessage::StreamChunk(McpStreamChunk::terminal("r", 2));
        assert_eq!(sse_event_name(&terminal), "stream-complete");

        let error = McpMessage::Error(McpError::new(None, ErrorCode::IoError, "x"));
        assert_eq!(sse_event_name(&error), "error");
    }
}
