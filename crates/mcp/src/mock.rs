//! Scripted in-memory transport for testing the adapter without a server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::{CallToolResult, McpConnection, McpServerConfig, McpToolInfo, ServerInfo};

/// Plays back queued connect failures and call results in order.
///
/// With nothing queued, `connect` succeeds and `call_tool` echoes the
/// arguments back as a text block.
#[derive(Default)]
pub struct ScriptedTransport {
    connect_failures: Mutex<VecDeque<McpError>>,
    results: Mutex<VecDeque<Result<CallToolResult, McpError>>>,
    tools: Mutex<Vec<McpToolInfo>>,
    call_delay: Option<Duration>,
    fail_disconnect: bool,
    connects: AtomicUsize,
    calls: AtomicUsize,
    disconnects: AtomicUsize,
    last_arguments: Mutex<Option<Value>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `call_tool` sleeps this long first.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = Some(delay);
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn with_tools(self, tools: Vec<McpToolInfo>) -> Self {
        *self.tools.lock().unwrap() = tools;
        self
    }

    pub fn queue_connect_failure(&self, err: McpError) {
        self.connect_failures.lock().unwrap().push_back(err);
    }

    pub fn queue_result(&self, result: Result<CallToolResult, McpError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn last_arguments(&self) -> Option<Value> {
        self.last_arguments.lock().unwrap().clone()
    }
}

#[async_trait]
impl McpTransport for ScriptedTransport {
    async fn connect(&self, config: &McpServerConfig) -> Result<McpConnection, McpError> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.connect_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(McpConnection {
            id: format!("scripted-{n}"),
            server_info: ServerInfo {
                name: format!("scripted {}", config.url),
                version: Some("1.0.0".into()),
            },
            capabilities: serde_json::json!({"tools": {}}),
        })
    }

    async fn list_tools(&self, _connection_id: &str) -> Result<Vec<McpToolInfo>, McpError> {
        Ok(self.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        _connection_id: &str,
        _tool_name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, McpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_arguments.lock().unwrap() = Some(arguments.clone());
        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }
        let queued = self.results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(CallToolResult::text(arguments.to_string())))
    }

    async fn disconnect(&self, connection_id: &str) -> Result<(), McpError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(McpError::ConnectionClosed(format!(
                "{connection_id} already closed"
            )));
        }
        Ok(())
    }
}
