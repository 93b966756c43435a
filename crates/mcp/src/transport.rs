//! MCP transport boundary.
//!
//! SSE/HTTP framing and the JSON-RPC envelope live behind [`McpTransport`];
//! this crate only sequences connect → list/call → disconnect around it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpError;
use crate::types::{CallToolResult, McpConnection, McpServerConfig, McpToolInfo};

/// Black-box client for remote MCP servers.
///
/// Connection ids returned by `connect` are the only handle; implementations
/// must accept `disconnect` for an id whose connection already failed.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&self, config: &McpServerConfig) -> Result<McpConnection, McpError>;

    async fn list_tools(&self, connection_id: &str) -> Result<Vec<McpToolInfo>, McpError>;

    async fn call_tool(
        &self,
        connection_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, McpError>;

    async fn disconnect(&self, connection_id: &str) -> Result<(), McpError>;
}
