//! Typed operation errors and their mapping onto wire error envelopes.

use mcp_protocol::{ErrorCode, McpError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("Path does not exist: {0}")]
    PathNotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Path is a directory, not a file: {0}")]
    NotAFile(String),

    #[error("File already exists: {0}")]
    FileExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(String),

    #[error("{0}")]
    ForbiddenCommand(String),

    #[error("Command timed out after {0}ms")]
    CommandTimeout(u64),

    #[error("Malformed request: {0}")]
    RequestError(String),

    #[error("Stream failure: {0}")]
    StreamError(String),

    /// The consumer of a stream went away. Never serialized; producers use
    /// it to unwind without emitting anything further.
    #[error("stream receiver dropped")]
    StreamClosed,
}

impl OpsError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            OpsError::UnknownOperation(_) => ErrorCode::UnknownOperation,
            OpsError::MissingParameter(_) => ErrorCode::MissingParameter,
            OpsError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            OpsError::PathNotFound(_) => ErrorCode::PathNotFound,
            OpsError::NotADirectory(_) => ErrorCode::NotADirectory,
            OpsError::NotAFile(_) => ErrorCode::NotAFile,
            OpsError::FileExists(_) => ErrorCode::FileExists,
            OpsError::Io(_) | OpsError::Serialization(_) => ErrorCode::IoError,
            OpsError::InvalidPattern(_) => ErrorCode::InvalidPattern,
            OpsError::ForbiddenCommand(_) => ErrorCode::ForbiddenCommand,
            OpsError::CommandTimeout(_) => ErrorCode::CommandTimeout,
            OpsError::RequestError(_) => ErrorCode::RequestError,
            OpsError::StreamError(_) | OpsError::StreamClosed => ErrorCode::StreamError,
        }
    }

    /// Convert into a wire error envelope correlated to `request_id`.
    pub fn into_envelope(self, request_id: Option<String>) -> McpError {
        McpError::new(request_id, self.error_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            OpsError::PathNotFound("/x".into()).error_code(),
            ErrorCode::PathNotFound
        );
        assert_eq!(
            OpsError::CommandTimeout(300_000).error_code(),
            ErrorCode::CommandTimeout
        );
        assert_eq!(
            OpsError::Io(std::io::Error::other("disk")).error_code(),
            ErrorCode::IoError
        );
    }

    #[test]
    fn test_envelope_carries_request_id() {
        let envelope =
            OpsError::UnknownOperation("frobnicate".into()).into_envelope(Some("req-9".into()));
        assert_eq!(envelope.request_id.as_deref(), Some("req-9"));
        assert_eq!(envelope.error_code, ErrorCode::UnknownOperation);
        assert!(envelope.error_message.contains("frobnicate"));
    }
}
