//! Runtime configuration for the chat orchestrator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Ollama-compatible inference endpoint.
    pub ollama_base_url: String,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Sampling temperature for model calls.
    pub temperature: f64,
    /// Token cap (`num_predict`) for model calls.
    pub max_tokens: u32,
    /// Timeout for model endpoint calls, in seconds.
    pub ollama_timeout_secs: u64,

    /// Base URL of the operations service.
    pub mcp_base_url: String,
    /// Per tool-call timeout, in seconds.
    pub tool_timeout_secs: u64,
    /// Retries per tool call on transport failures.
    pub max_retries: u32,
    /// Fixed delay between retries, in seconds.
    pub retry_delay_secs: u64,

    /// Master switch for tool use.
    pub tools_enabled: bool,
    /// Upper bound on tool calls executed per turn; excess calls are
    /// dropped with a warning.
    pub max_calls_per_turn: usize,

    /// Override for the caller's home directory; defaults to `$HOME`.
    pub home_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".to_string(),
            default_model: "llama3.2".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            ollama_timeout_secs: 120,
            mcp_base_url: "http://localhost:8080".to_string(),
            tool_timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 1,
            tools_enabled: true,
            max_calls_per_turn: 5,
            home_dir: None,
        }
    }
}
