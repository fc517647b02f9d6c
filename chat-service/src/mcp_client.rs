//! Tool client for the operations service.
//!
//! Every model-requested tool call becomes one unary MCP request with
//! `stream = false`, subject to a per-call timeout and a bounded
//! fixed-delay retry. Retries apply only to transport failures; a
//! well-formed error envelope is a final tool failure.

use std::time::Duration;

use anyhow::{Context, Result};
use mcp_protocol::{McpMessage, McpRequest, ResponseStatus};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::home::HomeDir;
use crate::models::{ToolCall, ToolCallResult};

#[derive(Debug, Clone)]
pub struct McpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    home: HomeDir,
}

impl McpClient {
    pub fn new(config: &Config, home: HomeDir) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build MCP HTTP client")?;

        Ok(Self {
            client,
            base_url: config.mcp_base_url.clone(),
            timeout: Duration::from_secs(config.tool_timeout_secs),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            home,
        })
    }

    /// Dispatch one tool call and classify the outcome. Never fails the
    /// turn: transport errors exhaust their retries and degrade to a
    /// failed tool result.
    pub async fn execute_tool_call(&self, tool_call: &ToolCall) -> ToolCallResult {
        info!(name = %tool_call.name, "executing tool call");

        let parameters = self.translate_parameters(&tool_call.parameters);
        let envelope = McpMessage::Request(McpRequest::new(
            tool_call.name.clone(),
            parameters,
            false,
        ));

        let url = format!("{}/api/mcp/request", self.base_url);
        let mut attempt = 0u32;
        loop {
            match self.send_once(&url, &envelope).await {
                Ok(response) => return classify_response(tool_call, &response),
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        name = %tool_call.name,
                        attempt,
                        %err,
                        "tool call transport failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    warn!(name = %tool_call.name, %err, "tool call failed after retries");
                    return ToolCallResult::error(
                        tool_call.id.clone(),
                        tool_call.name.clone(),
                        "Tool call failed due to service error",
                    );
                }
            }
        }
    }

    async fn send_once(&self, url: &str, envelope: &McpMessage) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(envelope)
            .send()
            .await
            .context("operations service unreachable")?;
        response
            .json::<Value>()
            .await
            .context("operations service returned an unreadable body")
    }

    /// Fetch the downstream operation catalog.
    pub async fn available_operations(&self) -> Result<Value> {
        let url = format!("{}/api/mcp/operations", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("operations service unreachable")?;
        response
            .json::<Value>()
            .await
            .context("failed to decode operations catalog")
    }

    /// True when the health endpoint reports the service up.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/mcp/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) => matches!(
                    body.get("status").and_then(Value::as_str),
                    Some("UP") | Some("healthy")
                ),
                Err(_) => false,
            },
            Err(err) => {
                warn!(%err, "operations service health check failed");
                false
            }
        }
    }

    /// Rewrite path aliases in the parameter map before dispatch.
    fn translate_parameters(&self, parameters: &Map<String, Value>) -> Map<String, Value> {
        let mut translated = parameters.clone();
        if let Some(Value::String(path)) = parameters.get("path") {
            let rewritten = self.home.translate_path(path);
            if rewritten != *path {
                info!(from = %path, to = %rewritten, "translated path alias");
            }
            translated.insert("path".to_string(), Value::String(rewritten));
        }
        translated
    }
}

/// Classify a response envelope: a `response` with `status = "success"` is
/// a success; any other envelope is a tool failure carrying its error
/// message.
fn classify_response(tool_call: &ToolCall, response: &Value) -> ToolCallResult {
    match serde_json::from_value::<McpMessage>(response.clone()) {
        Ok(McpMessage::Response(envelope)) => {
            if envelope.status == ResponseStatus::Success {
                ToolCallResult::success(
                    tool_call.id.clone(),
                    tool_call.name.clone(),
                    envelope.result,
                )
            } else {
                ToolCallResult::error(
                    tool_call.id.clone(),
                    tool_call.name.clone(),
                    "MCP operation failed",
                )
            }
        }
        Ok(McpMessage::Error(envelope)) => ToolCallResult::error(
            tool_call.id.clone(),
            tool_call.name.clone(),
            envelope.error_message,
        ),
        _ => {
            warn!(name = %tool_call.name, "unexpected MCP response shape");
            ToolCallResult::error(
                tool_call.id.clone(),
                tool_call.name.clone(),
                "Unexpected response format from MCP service",
            )
        }
    }
}
