//! Ollama HTTP client: chat-with-tools calls, model discovery, the tool
//! catalog advertised to the model, and tool-call extraction.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{ToolCall, ToolCallResult};

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    pub stream: bool,
    pub options: Options,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallData>>,
}

impl OllamaMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallData {
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Either a JSON object or a JSON-encoded string; both are accepted.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Options {
    pub temperature: f64,
    pub num_predict: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    default_model: String,
    default_temperature: f64,
    default_max_tokens: u32,
}

impl OllamaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama_timeout_secs))
            .build()
            .context("failed to build Ollama HTTP client")?;

        Ok(Self {
            client,
            base_url: config.ollama_base_url.clone(),
            default_model: config.default_model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }

    /// One chat completion, optionally advertising the tool catalog.
    pub async fn generate(
        &self,
        messages: Vec<OllamaMessage>,
        tools: Option<Vec<Tool>>,
        model: Option<&str>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Result<OllamaChatResponse> {
        let model = model.unwrap_or(&self.default_model).to_string();
        info!(%model, message_count = messages.len(), "generating chat response");

        let request = OllamaChatRequest {
            model,
            messages,
            tools,
            stream: false,
            options: Options {
                temperature: temperature.unwrap_or(self.default_temperature),
                num_predict: max_tokens.unwrap_or(self.default_max_tokens),
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("model endpoint unreachable")?
            .error_for_status()
            .context("model endpoint returned an error status")?;

        response
            .json::<OllamaChatResponse>()
            .await
            .context("failed to decode model response")
    }

    /// True when the tags endpoint answers with a model list.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) => body.get("models").is_some(),
                Err(_) => false,
            },
            Err(err) => {
                warn!(%err, "Ollama health check failed");
                false
            }
        }
    }

    /// Names of the models the endpoint currently serves.
    pub async fn available_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.base_url);
        let body: Value = match self.client.get(&url).send().await {
            Ok(response) => match response.json().await {
                Ok(body) => body,
                Err(err) => {
                    error!(%err, "failed to decode tags response");
                    return Vec::new();
                }
            },
            Err(err) => {
                error!(%err, "failed to list models");
                return Vec::new();
            }
        };

        body.get("models")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| model.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ============================================================================
// Tool catalog and tool-call handling
// ============================================================================

/// The fixed catalog advertised to the model. Independent of the
/// operations service's own catalog; mismatches surface as tool-execution
/// errors, not schema errors.
pub fn mcp_tools() -> Vec<Tool> {
    fn tool(name: &'static str, description: &'static str, parameters: Value) -> Tool {
        Tool {
            kind: "function",
            function: ToolFunction {
                name,
                description,
                parameters,
            },
        }
    }

    vec![
        tool(
            "list_directory",
            "List files and directories in a given path",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "The directory path to list"}
                },
                "required": ["path"]
            }),
        ),
        tool(
            "read_file",
            "Read the contents of a file",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "The file path to read"}
                },
                "required": ["path"]
            }),
        ),
        tool(
            "create_file",
            "Create a new file with specified content",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "The file path to create"},
                    "content": {"type": "string", "description": "The content to write to the file"}
                },
                "required": ["path", "content"]
            }),
        ),
        tool(
            "edit_file",
            "Edit an existing file by replacing its content",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "The file path to edit"},
                    "content": {"type": "string", "description": "The new content for the file"}
                },
                "required": ["path", "content"]
            }),
        ),
        tool(
            "append_file",
            "Append content to an existing file",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "The file path to append to"},
                    "content": {"type": "string", "description": "The content to append"}
                },
                "required": ["path", "content"]
            }),
        ),
        tool(
            "execute_command",
            "Execute a system command",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "The command to execute"},
                    "working_directory": {
                        "type": "string",
                        "description": "The working directory (optional, defaults to current directory)"
                    }
                },
                "required": ["command"]
            }),
        ),
        tool(
            "grep",
            "Search for patterns in files or directories",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string", "description": "The search pattern (regex)"},
                    "path": {"type": "string", "description": "The file or directory path to search in"},
                    "recursive": {"type": "boolean", "description": "Whether to search recursively"}
                },
                "required": ["pattern", "path"]
            }),
        ),
    ]
}

/// Extract tool calls from a model message, tolerating `arguments` encoded
/// as either a JSON object or a JSON string. Unparseable entries are
/// logged and skipped.
pub fn parse_tool_calls(message: &OllamaMessage) -> Vec<ToolCall> {
    let Some(tool_calls) = message.tool_calls.as_ref() else {
        return Vec::new();
    };

    let mut parsed = Vec::new();
    for data in tool_calls {
        let parameters: Map<String, Value> = match &data.function.arguments {
            Value::Object(map) => map.clone(),
            Value::String(encoded) => match serde_json::from_str::<Map<String, Value>>(encoded) {
                Ok(map) => map,
                Err(err) => {
                    error!(name = %data.function.name, %err, "failed to parse tool call arguments");
                    continue;
                }
            },
            _ => Map::new(),
        };

        parsed.push(ToolCall {
            id: Uuid::new_v4().to_string(),
            name: data.function.name.clone(),
            parameters,
        });
    }
    parsed
}

/// Build the synthetic `tool`-role message summarizing every result of a
/// turn's fan-out.
pub fn tool_result_message(results: &[ToolCallResult]) -> OllamaMessage {
    let mut content = String::from("Tool execution results:\n");
    for result in results {
        content.push_str(&format!("- {}: ", result.tool_name));
        if result.success {
            content.push_str("SUCCESS - ");
            if let Some(value) = &result.result {
                content.push_str(&value.to_string());
            }
        } else {
            content.push_str("ERROR - ");
            content.push_str(result.error.as_deref().unwrap_or("unknown error"));
        }
        content.push('\n');
    }
    OllamaMessage::new("tool", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_calls(calls: Vec<ToolCallData>) -> OllamaMessage {
        OllamaMessage {
            role: "assistant".to_string(),
            content: String::new(),
            tool_calls: Some(calls),
        }
    }

    #[test]
    fn test_catalog_names() {
        let names: Vec<&str> = mcp_tools().iter().map(|t| t.function.name).collect();
        assert_eq!(
            names,
            [
                "list_directory",
                "read_file",
                "create_file",
                "edit_file",
                "append_file",
                "execute_command",
                "grep"
            ]
        );
        assert!(mcp_tools().iter().all(|t| t.kind == "function"));
    }

    #[test]
    fn test_parse_tool_calls_object_arguments() {
        let message = message_with_calls(vec![ToolCallData {
            function: FunctionCall {
                name: "list_directory".to_string(),
                arguments: json!({"path": "/tmp"}),
            },
        }]);

        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "list_directory");
        assert_eq!(calls[0].parameters["path"], json!("/tmp"));
    }

    #[test]
    fn test_parse_tool_calls_string_arguments() {
        let message = message_with_calls(vec![ToolCallData {
            function: FunctionCall {
                name: "read_file".to_string(),
                arguments: json!("{\"path\": \"/etc/hosts\"}"),
            },
        }]);

        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parameters["path"], json!("/etc/hosts"));
    }

    #[test]
    fn test_parse_tool_calls_skips_garbage_arguments() {
        let message = message_with_calls(vec![
            ToolCallData {
                function: FunctionCall {
                    name: "broken".to_string(),
                    arguments: json!("{not json"),
                },
            },
            ToolCallData {
                function: FunctionCall {
                    name: "grep".to_string(),
                    arguments: json!({"pattern": "x"}),
                },
            },
        ]);

        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "grep");
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let message = message_with_calls(vec![
            ToolCallData {
                function: FunctionCall {
                    name: "read_file".to_string(),
                    arguments: json!({"path": "/a"}),
                },
            },
            ToolCallData {
                function: FunctionCall {
                    name: "read_file".to_string(),
                    arguments: json!({"path": "/b"}),
                },
            },
        ]);

        let calls = parse_tool_calls(&message);
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn test_tool_result_message_format() {
        let results = vec![
            ToolCallResult::success("1", "list_directory", json!({"total_count": 2})),
            ToolCallResult::error("2", "read_file", "Path does not exist: /no"),
        ];

        let message = tool_result_message(&results);
        assert_eq!(message.role, "tool");
        assert!(message.content.starts_with("Tool execution results:\n"));
        assert!(message
            .content
            .contains("- list_directory: SUCCESS - {\"total_count\":2}"));
        assert!(message
            .content
            .contains("- read_file: ERROR - Path does not exist: /no"));
    }
}
