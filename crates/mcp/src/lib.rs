//! MCP (Model Context Protocol) adapter for flowtool.
//!
//! Lets the function-calling loop reach tools hosted on remote MCP servers.
//! The wire protocol itself sits behind [`McpTransport`]; this crate adds
//! configuration checks, `{{variable}}` templating, retries with backoff,
//! per-call timeouts and guaranteed disconnects.
//!
//! # Architecture
//!
//! - **types**: server config, connection and `tools/call` payloads
//! - **transport**: the black-box transport trait
//! - **connection**: per-call connection bookkeeping
//! - **executor**: `mcp_tool` and discovered remote tools as executors
//! - **error**: transport errors and their classification
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowtool_mcp::{McpToolExecutor, McpTransport};
//! use flowtool_tool_runtime::ToolRegistry;
//!
//! fn register(transport: Arc<dyn McpTransport>, registry: &mut ToolRegistry) {
//!     registry.register(McpToolExecutor::new(transport));
//! }
//! ```

pub mod connection;
pub mod error;
pub mod executor;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use connection::{ConnectionGuard, ConnectionManager};
pub use error::McpError;
pub use executor::{CallOptions, McpCallRequest, McpToolExecutor, RemoteMcpTool, MCP_TOOL_NAME};
pub use transport::McpTransport;
pub use types::{
    AuthType, CallToolResult, McpConnection, McpServerConfig, McpToolInfo, ServerInfo,
    ToolContent, TransportKind,
};
