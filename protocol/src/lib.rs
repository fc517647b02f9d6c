//! Wire envelope for the MCP operations protocol.
//!
//! Every message exchanged with the operations service is one of four
//! envelope kinds, discriminated by a `type` field: `request`, `response`,
//! `stream_chunk` and `error`. The same schema is carried over all
//! transports (unary HTTP, NDJSON, SSE, WebSocket).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Protocol version tag stamped on every envelope.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Sentinel payload carried by the terminal chunk of every stream.
pub const STREAM_COMPLETE: &str = "STREAM_COMPLETE";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

/// Envelope discriminated by the `type` field.
///
/// Parsing examines the tag first and then decodes the remaining fields;
/// unknown fields are ignored on receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum McpMessage {
    #[serde(rename = "request")]
    Request(McpRequest),
    #[serde(rename = "response")]
    Response(McpResponse),
    #[serde(rename = "stream_chunk")]
    StreamChunk(McpStreamChunk),
    #[serde(rename = "error")]
    Error(McpError),
}

impl McpMessage {
    /// The request id this envelope correlates to, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            McpMessage::Request(r) => Some(&r.id),
            McpMessage::Response(r) => Some(&r.request_id),
            McpMessage::StreamChunk(c) => Some(&c.request_id),
            McpMessage::Error(e) => e.request_id.as_deref(),
        }
    }

    /// The sender-assigned message id.
    pub fn id(&self) -> &str {
        match self {
            McpMessage::Request(r) => &r.id,
            McpMessage::Response(r) => &r.id,
            McpMessage::StreamChunk(c) => &c.id,
            McpMessage::Error(e) => &e.id,
        }
    }
}

/// Request envelope initiating an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
    pub operation: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub stream: bool,
}

impl McpRequest {
    pub fn new(operation: impl Into<String>, parameters: Map<String, Value>, stream: bool) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            version: default_version(),
            operation: operation.into(),
            parameters,
            stream,
        }
    }
}

/// Status carried on response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Streaming,
    Error,
}

/// Response envelope carrying an operation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
    pub request_id: String,
    pub status: ResponseStatus,
    #[serde(default)]
    pub result: Value,
    pub stream_complete: bool,
}

impl McpResponse {
    /// Successful completion of a non-streaming operation.
    pub fn success(request_id: impl Into<String>, result: Value) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            version: default_version(),
            request_id: request_id.into(),
            status: ResponseStatus::Success,
            result,
            stream_complete: true,
        }
    }

    /// Placeholder returned by the unary endpoint for streaming requests.
    pub fn stream_initiated(request_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            version: default_version(),
            request_id: request_id.into(),
            status: ResponseStatus::Streaming,
            result: Value::String("Stream initiated".to_string()),
            stream_complete: false,
        }
    }
}

/// One element of a streamed response.
///
/// `sequence` is 1-based and strictly increasing per request id; the last
/// chunk of every stream has `is_final = true` and [`STREAM_COMPLETE`] as
/// its data payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpStreamChunk {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
    pub request_id: String,
    pub sequence: u64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub is_final: bool,
}

impl McpStreamChunk {
    pub fn new(request_id: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            version: default_version(),
            request_id: request_id.into(),
            sequence,
            data,
            is_final: false,
        }
    }

    /// The terminal sentinel chunk closing a stream.
    pub fn terminal(request_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            version: default_version(),
            request_id: request_id.into(),
            sequence,
            data: Value::String(STREAM_COMPLETE.to_string()),
            is_final: true,
        }
    }
}

/// Stable error codes shared by all transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnknownOperation,
    MissingParameter,
    InvalidParameter,
    PathNotFound,
    NotADirectory,
    NotAFile,
    FileExists,
    IoError,
    InvalidPattern,
    ForbiddenCommand,
    CommandTimeout,
    RequestError,
    StreamError,
}

/// Error envelope.
///
/// `request_id` is absent only when the request itself failed to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub error_code: ErrorCode,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl McpError {
    pub fn new(
        request_id: impl Into<Option<String>>,
        error_code: ErrorCode,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            version: default_version(),
            request_id: request_id.into(),
            error_code,
            error_message: error_message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
