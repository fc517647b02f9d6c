//! Persistent bidirectional socket transport.
//!
//! Each inbound text frame parses to one request envelope; every outbound
//! frame is one envelope. Streaming and non-streaming requests are
//! multiplexed over a single session.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use mcp_protocol::{ErrorCode, McpError, McpMessage, McpRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::ops;

/// Buffer for outbound envelopes before they hit the socket.
const OUTBOUND_BUFFER_SIZE: usize = 64;

/// WebSocket upgrade handler.
///
/// GET /ws/mcp
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    info!("WebSocket session established");
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<McpMessage>(OUTBOUND_BUFFER_SIZE);

    // All outbound traffic funnels through one task so concurrent request
    // handlers never interleave partial frames.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    warn!(%err, "failed to serialize envelope");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, "socket read error");
                break;
            }
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<McpRequest>(&text) {
                Ok(request) => {
                    tokio::spawn(handle_request(state.clone(), request, tx.clone()));
                }
                Err(err) => {
                    let envelope = McpError::new(
                        None,
                        ErrorCode::RequestError,
                        format!("Invalid JSON message: {err}"),
                    );
                    if tx.send(McpMessage::Error(envelope)).await.is_err() {
                        break;
                    }
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(tx);
    let _ = send_task.await;
    info!("WebSocket session completed");
}

async fn handle_request(state: AppState, request: McpRequest, tx: mpsc::Sender<McpMessage>) {
    info!(operation = %request.operation, stream = request.stream, "handling WebSocket request");
    if request.stream {
        let mut stream = ops::stream_operation(state.config.clone(), request);
        while let Some(message) = stream.next().await {
            if tx.send(message).await.is_err() {
                // Session gone; dropping the stream cancels the producer.
                break;
            }
        }
    } else {
        let message = ops::respond_unary(&state.config, &request).await;
        let _ = tx.send(message).await;
    }
}
