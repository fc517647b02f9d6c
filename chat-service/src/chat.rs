//! Turn runner: the prompt -> tool-call -> tool-exec -> final-prompt state
//! machine executed once per chat request.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::home::HomeDir;
use crate::mcp_client::McpClient;
use crate::models::{ChatMessage, ChatRequest, ChatResponse, ToolCall};
use crate::ollama::{self, OllamaClient, OllamaMessage};
use crate::store::ConversationStore;

const NO_RESPONSE_APOLOGY: &str = "I apologize, but I couldn't generate a response.";
const TOOL_RESULTS_APOLOGY: &str = "I apologize, but I couldn't process the tool results properly.";

pub struct ChatService {
    store: Arc<ConversationStore>,
    ollama: OllamaClient,
    mcp: McpClient,
    home: HomeDir,
    config: Arc<Config>,
}

impl ChatService {
    pub fn new(store: Arc<ConversationStore>, config: Arc<Config>) -> Result<Self> {
        let home = HomeDir::resolve(config.home_dir.clone());
        let ollama = OllamaClient::new(&config)?;
        let mcp = McpClient::new(&config, home.clone())?;
        Ok(Self {
            store,
            ollama,
            mcp,
            home,
            config,
        })
    }

    /// Process one chat turn.
    ///
    /// The user message is persisted before the first model call; the
    /// assistant message is persisted after the final one. A failing first
    /// model call propagates to the caller; a failing second call degrades
    /// to a fixed apology.
    pub async fn process_chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = Instant::now();
        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(%conversation_id, "processing chat request");

        // New conversations open with a system-context message.
        if self.store.history(&conversation_id).is_empty() {
            self.store.add_message(ChatMessage::new(
                "system",
                self.system_context(),
                &conversation_id,
            ));
        }
        self.store.add_message(ChatMessage::new(
            "user",
            &request.message,
            &conversation_id,
        ));

        let history = self.store.history(&conversation_id);
        let mut messages: Vec<OllamaMessage> = history
            .iter()
            .map(|message| OllamaMessage::new(&message.role, &message.content))
            .collect();

        let tools_enabled = self.config.tools_enabled && request.enable_tools != Some(false);
        let tools = tools_enabled.then(ollama::mcp_tools);

        let first = self
            .ollama
            .generate(
                messages.clone(),
                tools,
                request.model.as_deref(),
                request.temperature,
                request.max_tokens,
            )
            .await?;
        let model_used = first.model.clone();

        let tool_calls = if tools_enabled {
            first
                .message
                .as_ref()
                .map(ollama::parse_tool_calls)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let (content, tool_results) = if tool_calls.is_empty() {
            let content = first
                .message
                .map(|message| message.content)
                .unwrap_or_else(|| NO_RESPONSE_APOLOGY.to_string());
            (content, Vec::new())
        } else {
            info!(count = tool_calls.len(), "executing tool calls");
            let calls = truncate_calls(tool_calls, self.config.max_calls_per_turn);

            // Fan out the remaining calls concurrently, preserving order.
            let results = futures::future::join_all(
                calls.iter().map(|call| self.mcp.execute_tool_call(call)),
            )
            .await;

            messages.push(ollama::tool_result_message(&results));
            let content = match self
                .ollama
                .generate(
                    messages,
                    None,
                    request.model.as_deref(),
                    request.temperature,
                    request.max_tokens,
                )
                .await
            {
                Ok(second) => second
                    .message
                    .map(|message| message.content)
                    .unwrap_or_else(|| TOOL_RESULTS_APOLOGY.to_string()),
                Err(err) => {
                    error!(%err, "final model call failed");
                    TOOL_RESULTS_APOLOGY.to_string()
                }
            };
            (content, results)
        };

        let mut assistant = ChatMessage::new("assistant", content, &conversation_id);
        if !tool_results.is_empty() {
            assistant.tool_call_results = Some(tool_results.clone());
        }
        self.store.add_message(assistant.clone());

        let elapsed = start.elapsed().as_millis() as u64;
        info!(%conversation_id, elapsed_ms = elapsed, "chat processing completed");

        Ok(ChatResponse {
            message: assistant,
            conversation_id,
            model_used,
            tool_calls_made: tool_results,
            processing_time_ms: elapsed,
            timestamp: Utc::now(),
        })
    }

    /// Aggregate health of the model endpoint and the operations service.
    pub async fn service_health(&self) -> (bool, Value) {
        let (ollama_healthy, mcp_healthy) =
            tokio::join!(self.ollama.check_health(), self.mcp.check_health());
        let healthy = ollama_healthy && mcp_healthy;
        let body = json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "services": {
                "ollama": {"healthy": ollama_healthy},
                "mcp": {"healthy": mcp_healthy},
            },
            "tools_enabled": self.config.tools_enabled,
        });
        (healthy, body)
    }

    /// Available models and downstream operations.
    pub async fn capabilities(&self) -> Value {
        let (models, operations) = tokio::join!(
            self.ollama.available_models(),
            self.mcp.available_operations()
        );
        json!({
            "models": models,
            "tools_enabled": self.config.tools_enabled,
            "mcp_operations": operations.unwrap_or_else(|_| Value::String("unavailable".to_string())),
            "max_tool_calls_per_turn": self.config.max_calls_per_turn,
        })
    }

    fn system_context(&self) -> String {
        let home = self.home.home_directory();
        format!(
            "You are an AI assistant with access to powerful tools for file operations \
             and system commands. Important system context: \
             - The current user's home directory is {home} \
             - Use absolute paths when possible \
             - When users ask for 'my home directory' or 'home directory', use {home} \
             - Common paths: /Applications for apps, /tmp for temp files, {home} for user home \
             Always use the available tools to help users with file operations, system \
             commands, and information gathering."
        )
    }
}

/// Enforce the per-turn fan-out bound, logging what gets dropped.
fn truncate_calls(mut calls: Vec<ToolCall>, limit: usize) -> Vec<ToolCall> {
    if calls.len() > limit {
        warn!(
            requested = calls.len(),
            limit, "too many tool calls requested, truncating"
        );
        calls.truncate(limit);
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            parameters: Map::new(),
        }
    }

    #[test]
    fn test_truncate_preserves_order_and_bound() {
        let calls: Vec<ToolCall> = (0..7).map(|i| call(&format!("op{i}"))).collect();
        let bounded = truncate_calls(calls, 5);
        assert_eq!(bounded.len(), 5);
        assert_eq!(bounded[0].name, "op0");
        assert_eq!(bounded[4].name, "op4");
    }

    #[test]
    fn test_truncate_noop_under_limit() {
        let calls = vec![call("a"), call("b")];
        assert_eq!(truncate_calls(calls, 5).len(), 2);
    }

    #[test]
    fn test_system_context_names_home_directory() {
        let config = Arc::new(Config {
            home_dir: Some("/users/alice".to_string()),
            ..Config::default()
        });
        let service = ChatService::new(Arc::new(ConversationStore::new()), config).unwrap();
        let context = service.system_context();
        assert!(context.contains("/users/alice"));
        assert!(context.contains("absolute paths"));
    }
}
