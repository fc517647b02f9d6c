//! Runtime configuration for the operations service.

use serde::{Deserialize, Serialize};

/// Operations service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default timeout for command execution, in seconds. Overridable per
    /// request via the `timeout_seconds` parameter.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Buffer size of the per-request streaming channel. A slow consumer
    /// pauses the producer once the buffer fills; chunks are never dropped.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_command_timeout_secs() -> u64 {
    300
}

fn default_stream_buffer() -> usize {
    32
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            stream_buffer: default_stream_buffer(),
        }
    }
}
