//! Chat API models: conversation messages, requests and responses, and
//! tool-call bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    /// One of `system`, `user`, `assistant`, `tool`.
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_results: Option<Vec<ToolCallResult>>,
}

impl ChatMessage {
    pub fn new(
        role: impl Into<String>,
        content: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            conversation_id: conversation_id.into(),
            tool_calls: None,
            tool_call_results: None,
        }
    }
}

/// A structured function invocation the model asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub parameters: Map<String, Value>,
}

/// Outcome of one dispatched tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn success(id: impl Into<String>, tool_name: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Body of `POST /api/chat/message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enable_tools: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Response to a processed chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub tool_calls_made: Vec<ToolCallResult>,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}
