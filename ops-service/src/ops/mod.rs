//! Protocol dispatch: routes request envelopes to the engines and frames
//! results as response or stream-chunk envelopes.

pub mod command;
pub mod files;
pub mod search;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mcp_protocol::{McpMessage, McpRequest, McpResponse, McpStreamChunk};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::Config;
use crate::error::OpsError;

/// Outbound side of one streaming request. Numbers chunks from 1 and
/// correlates every envelope to the originating request id. Cloneable so
/// concurrent producers (e.g. the command engine's two pipe readers) share
/// one sequence.
#[derive(Clone)]
pub struct StreamSender {
    request_id: String,
    sequence: Arc<AtomicU64>,
    tx: mpsc::Sender<McpMessage>,
}

impl StreamSender {
    fn new(request_id: String, tx: mpsc::Sender<McpMessage>) -> Self {
        Self {
            request_id,
            sequence: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Emit one data chunk. Fails with [`OpsError::StreamClosed`] when the
    /// consumer is gone; producers should unwind on that.
    pub async fn data(&self, data: Value) -> Result<(), OpsError> {
        let chunk = McpStreamChunk::new(&self.request_id, self.next_sequence(), data);
        self.tx
            .send(McpMessage::StreamChunk(chunk))
            .await
            .map_err(|_| OpsError::StreamClosed)
    }

    /// Resolves when the consumer has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    async fn finish(&self) {
        let chunk = McpStreamChunk::terminal(&self.request_id, self.next_sequence());
        let _ = self.tx.send(McpMessage::StreamChunk(chunk)).await;
    }

    async fn fail(&self, err: OpsError) {
        let envelope = err.into_envelope(Some(self.request_id.clone()));
        let _ = self.tx.send(McpMessage::Error(envelope)).await;
    }
}

/// Execute a non-streaming request and produce its correlated envelope.
/// Streaming requests receive the historical "stream initiated" stub.
pub async fn respond_unary(config: &Config, request: &McpRequest) -> McpMessage {
    if request.stream {
        return McpMessage::Response(McpResponse::stream_initiated(request.id.clone()));
    }
    match execute(config, request).await {
        Ok(result) => McpMessage::Response(McpResponse::success(request.id.clone(), result)),
        Err(err) => McpMessage::Error(err.into_envelope(Some(request.id.clone()))),
    }
}

/// Execute a non-streaming operation, returning its result payload.
pub async fn execute(config: &Config, request: &McpRequest) -> Result<Value, OpsError> {
    match request.operation.as_str() {
        "list_directory" => {
            let path = string_param_or(request, "path", ".");
            Ok(serde_json::to_value(files::list_directory(&path).await?)?)
        }
        "read_file" => {
            let path = string_param(request, "path")?;
            Ok(serde_json::to_value(files::read_file(&path).await?)?)
        }
        "create_file" => {
            let path = string_param(request, "path")?;
            let content = string_param_or(request, "content", "");
            Ok(serde_json::to_value(files::create_file(&path, &content).await?)?)
        }
        "edit_file" => {
            let path = string_param(request, "path")?;
            let content = string_param(request, "content")?;
            Ok(serde_json::to_value(files::edit_file(&path, &content).await?)?)
        }
        "append_file" => {
            let path = string_param(request, "path")?;
            let content = string_param(request, "content")?;
            Ok(serde_json::to_value(files::append_file(&path, &content).await?)?)
        }
        "grep" => {
            let pattern = string_param(request, "pattern")?;
            let path = string_param_or(request, "path", ".");
            let recursive = bool_param_or(request, "recursive", false)?;
            let case_sensitive = bool_param_or(request, "case_sensitive", true)?;
            Ok(serde_json::to_value(
                search::grep(&pattern, &path, recursive, case_sensitive).await?,
            )?)
        }
        "execute_command" => {
            let cmd = string_param(request, "command")?;
            let working_directory = string_param_opt(request, "working_directory");
            let timeout_secs = u64_param_or(request, "timeout_seconds", config.command_timeout_secs)?;
            Ok(serde_json::to_value(
                command::execute(
                    &cmd,
                    working_directory.as_deref(),
                    Duration::from_secs(timeout_secs),
                )
                .await?,
            )?)
        }
        other => Err(OpsError::UnknownOperation(other.to_string())),
    }
}

/// Run a streaming request, producing the full envelope sequence: data
/// chunks in order, then either the terminal sentinel or a single in-band
/// error envelope.
pub fn stream_operation(config: Arc<Config>, request: McpRequest) -> ReceiverStream<McpMessage> {
    let (tx, rx) = mpsc::channel(config.stream_buffer);
    tokio::spawn(async move {
        let sender = StreamSender::new(request.id.clone(), tx);
        match run_streaming(&config, &request, &sender).await {
            Ok(()) => sender.finish().await,
            // Consumer went away; nothing left to tell it.
            Err(OpsError::StreamClosed) => {}
            Err(err) => sender.fail(err).await,
        }
    });
    ReceiverStream::new(rx)
}

/// A one-envelope stream carrying a single pre-built message. Used for
/// request-level failures on the streaming transports.
pub fn single_message_stream(message: McpMessage) -> ReceiverStream<McpMessage> {
    let (tx, rx) = mpsc::channel(1);
    let _ = tx.try_send(message);
    ReceiverStream::new(rx)
}

async fn run_streaming(
    config: &Config,
    request: &McpRequest,
    tx: &StreamSender,
) -> Result<(), OpsError> {
    match request.operation.as_str() {
        "list_directory" => {
            let path = string_param_or(request, "path", ".");
            files::list_directory_stream(&path, tx).await
        }
        "read_file" => {
            let path = string_param(request, "path")?;
            files::read_file_stream(&path, tx).await
        }
        "grep" => {
            let pattern = string_param(request, "pattern")?;
            let path = string_param_or(request, "path", ".");
            let recursive = bool_param_or(request, "recursive", false)?;
            let case_sensitive = bool_param_or(request, "case_sensitive", true)?;
            search::grep_stream(&pattern, &path, recursive, case_sensitive, tx).await
        }
        "execute_command" => {
            let cmd = string_param(request, "command")?;
            let working_directory = string_param_opt(request, "working_directory");
            let include_stderr = bool_param_or(request, "include_stderr", true)?;
            command::execute_stream(&cmd, working_directory.as_deref(), include_stderr, tx).await
        }
        // Write operations have no streaming variant; the stream flag is
        // ignored and the single result is framed as one chunk.
        "create_file" | "edit_file" | "append_file" => {
            let result = execute(config, request).await?;
            tx.data(result).await
        }
        other => Err(OpsError::UnknownOperation(other.to_string())),
    }
}

// ============================================================================
// Parameter extraction
// ============================================================================

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_param(request: &McpRequest, name: &'static str) -> Result<String, OpsError> {
    match request.parameters.get(name) {
        Some(Value::Null) | None => Err(OpsError::MissingParameter(name)),
        Some(value) => Ok(value_to_string(value)),
    }
}

fn string_param_or(request: &McpRequest, name: &'static str, default: &str) -> String {
    match request.parameters.get(name) {
        Some(Value::Null) | None => default.to_string(),
        Some(value) => value_to_string(value),
    }
}

fn string_param_opt(request: &McpRequest, name: &'static str) -> Option<String> {
    match request.parameters.get(name) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value_to_string(value)),
    }
}

fn bool_param_or(request: &McpRequest, name: &'static str, default: bool) -> Result<bool, OpsError> {
    match request.parameters.get(name) {
        Some(Value::Null) | None => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(OpsError::InvalidParameter {
                name,
                message: format!("expected boolean, got '{other}'"),
            }),
        },
        Some(other) => Err(OpsError::InvalidParameter {
            name,
            message: format!("expected boolean, got {other}"),
        }),
    }
}

fn u64_param_or(request: &McpRequest, name: &'static str, default: u64) -> Result<u64, OpsError> {
    match request.parameters.get(name) {
        Some(Value::Null) | None => Ok(default),
        Some(Value::Number(number)) => number.as_u64().ok_or_else(|| OpsError::InvalidParameter {
            name,
            message: format!("expected non-negative integer, got {number}"),
        }),
        Some(Value::String(s)) => s.parse().map_err(|_| OpsError::InvalidParameter {
            name,
            message: format!("expected non-negative integer, got '{s}'"),
        }),
        Some(other) => Err(OpsError::InvalidParameter {
            name,
            message: format!("expected non-negative integer, got {other}"),
        }),
    }
}

// ============================================================================
// Discovery catalog
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OperationInfo {
    pub description: &'static str,
    pub parameters: BTreeMap<&'static str, &'static str>,
    pub streaming: bool,
}

/// The fixed operation catalog served by the discovery endpoint.
pub fn operation_catalog() -> BTreeMap<&'static str, OperationInfo> {
    fn params(entries: &[(&'static str, &'static str)]) -> BTreeMap<&'static str, &'static str> {
        entries.iter().copied().collect()
    }

    BTreeMap::from([
        (
            "list_directory",
            OperationInfo {
                description: "Lists files and directories in a path",
                parameters: params(&[("path", "string - directory path to list")]),
                streaming: true,
            },
        ),
        (
            "read_file",
            OperationInfo {
                description: "Reads content of a file",
                parameters: params(&[("path", "string - file path to read")]),
                streaming: true,
            },
        ),
        (
            "create_file",
            OperationInfo {
                description: "Creates a new file with content",
                parameters: params(&[
                    ("path", "string - file path to create"),
                    ("content", "string - file content"),
                ]),
                streaming: false,
            },
        ),
        (
            "edit_file",
            OperationInfo {
                description: "Edits (overwrites) a file with new content",
                parameters: params(&[
                    ("path", "string - file path to edit"),
                    ("content", "string - new file content"),
                ]),
                streaming: false,
            },
        ),
        (
            "append_file",
            OperationInfo {
                description: "Appends content to an existing file",
                parameters: params(&[
                    ("path", "string - file path to append to"),
                    ("content", "string - content to append"),
                ]),
                streaming: false,
            },
        ),
        (
            "grep",
            OperationInfo {
                description: "Searches for patterns in files",
                parameters: params(&[
                    ("pattern", "string - regex pattern to search for"),
                    ("path", "string - file or directory path to search"),
                    ("recursive", "boolean - search recursively (default: false)"),
                    ("case_sensitive", "boolean - case sensitive search (default: true)"),
                ]),
                streaming: true,
            },
        ),
        (
            "execute_command",
            OperationInfo {
                description: "Executes a system command",
                parameters: params(&[
                    ("command", "string - command to execute"),
                    ("working_directory", "string - working directory (optional)"),
                    ("timeout_seconds", "integer - timeout in seconds (optional)"),
                ]),
                streaming: true,
            },
        ),
    ])
}
