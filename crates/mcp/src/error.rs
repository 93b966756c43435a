//! Error types for the MCP crate.

use flowtool_tool_runtime::{ClassifiedError, ErrorCode, ErrorMetadata};

/// Failures reported by an [`McpTransport`](crate::transport::McpTransport).
///
/// Converted to [`ClassifiedError`] through `classify_error`; variants that
/// know their code say so, the rest are classified from their message.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Could not establish a connection (DNS, refused, TLS, ...).
    #[error("Failed to connect to MCP server: {0}")]
    ConnectionFailed(String),

    /// The server answered with a non-success HTTP status.
    #[error("MCP server returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The connection dropped mid-request.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The server spoke something other than MCP.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Tool execution failed on the server.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Already classified upstream.
    #[error("{0}")]
    Classified(ClassifiedError),
}

impl ErrorMetadata for McpError {
    fn classified(&self) -> Option<ClassifiedError> {
        match self {
            McpError::Classified(err) => Some(err.clone()),
            _ => None,
        }
    }

    fn error_code(&self) -> Option<ErrorCode> {
        match self {
            McpError::ConnectionClosed(_) => Some(ErrorCode::ConnectionClosed),
            McpError::Protocol(_) => Some(ErrorCode::ProtocolError),
            McpError::ToolExecution(_) => Some(ErrorCode::ExecutionError),
            McpError::ConnectionFailed(_) | McpError::Http { .. } | McpError::Classified(_) => {
                None
            }
        }
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            McpError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ClassifiedError> for McpError {
    fn from(err: ClassifiedError) -> Self {
        McpError::Classified(err)
    }
}
