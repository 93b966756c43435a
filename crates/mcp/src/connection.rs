//! Transient connection tracking on top of an [`McpTransport`].
//!
//! Each call opens its own connection and closes it when done; there is no
//! pooling. A connection is owned by a [`ConnectionGuard`]: closing it
//! explicitly awaits the transport, dropping it (for example when the
//! surrounding future is cancelled by a timeout) forgets the entry at once
//! and finishes the disconnect on a spawned task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::{CallToolResult, McpConnection, McpServerConfig, McpToolInfo};

#[derive(Debug, Clone)]
struct ActiveConnection {
    /// Id assigned by the transport.
    transport_id: String,
    server_url: String,
    opened_at: Instant,
}

type ActiveMap = Arc<Mutex<HashMap<String, ActiveConnection>>>;

fn lock(active: &ActiveMap) -> MutexGuard<'_, HashMap<String, ActiveConnection>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn close_entry(transport: &dyn McpTransport, connection_id: &str, entry: ActiveConnection) {
    let open_ms = entry.opened_at.elapsed().as_millis() as u64;
    match transport.disconnect(&entry.transport_id).await {
        Ok(()) => debug!(
            connection_id,
            server = %entry.server_url,
            open_ms,
            "MCP connection closed"
        ),
        Err(e) => warn!(
            connection_id,
            server = %entry.server_url,
            error = %e,
            "MCP disconnect failed; connection dropped"
        ),
    }
}

pub struct ConnectionManager {
    transport: Arc<dyn McpTransport>,
    active: ActiveMap,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self {
            transport,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open a connection. The guard carries a manager-issued id.
    pub async fn connect(&self, config: &McpServerConfig) -> Result<ConnectionGuard, McpError> {
        let connection = self.transport.connect(config).await?;
        let id = Uuid::new_v4().to_string();

        debug!(
            connection_id = %id,
            server = %config.url,
            server_name = %connection.server_info.name,
            "MCP connection opened"
        );
        let transport_id = connection.id.clone();
        lock(&self.active).insert(
            id.clone(),
            ActiveConnection {
                transport_id: transport_id.clone(),
                server_url: config.url.clone(),
                opened_at: Instant::now(),
            },
        );

        Ok(ConnectionGuard {
            connection: McpConnection { id, ..connection },
            transport_id,
            transport: self.transport.clone(),
            active: self.active.clone(),
        })
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

/// One open connection. Never outlives its owner: dropped without
/// [`close`](ConnectionGuard::close), it still disconnects.
pub struct ConnectionGuard {
    connection: McpConnection,
    transport_id: String,
    transport: Arc<dyn McpTransport>,
    active: ActiveMap,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.connection.id
    }

    pub fn connection(&self) -> &McpConnection {
        &self.connection
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        self.transport.list_tools(&self.transport_id).await
    }

    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, McpError> {
        self.transport
            .call_tool(&self.transport_id, tool_name, arguments)
            .await
    }

    /// Close and forget the connection. Never fails; transport errors are logged.
    pub async fn close(self) {
        let entry = lock(&self.active).remove(self.id());
        if let Some(entry) = entry {
            close_entry(self.transport.as_ref(), self.id(), entry).await;
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(entry) = lock(&self.active).remove(self.id()) else {
            return;
        };

        let connection_id = self.connection.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(connection_id = %connection_id, "MCP call abandoned; disconnecting in background");
                let transport = self.transport.clone();
                handle.spawn(async move {
                    close_entry(transport.as_ref(), &connection_id, entry).await;
                });
            }
            Err(_) => warn!(
                connection_id = %connection_id,
                server = %entry.server_url,
                "No runtime to disconnect MCP connection; dropped"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedTransport;
    use std::time::Duration;

    fn config() -> McpServerConfig {
        McpServerConfig::new("http://localhost:9000/sse")
    }

    #[tokio::test]
    async fn test_connect_call_close() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_result(Ok(CallToolResult::text("pong")));
        let manager = ConnectionManager::new(transport.clone());

        let connection = manager.connect(&config()).await.unwrap();
        assert_eq!(manager.active_count(), 1);
        assert!(!connection.id().starts_with("scripted-"));

        let result = connection
            .call_tool("ping", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result, CallToolResult::text("pong"));

        connection.close().await;
        assert_eq!(manager.active_count(), 0);
        assert_eq!(transport.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_failed_close_still_removes_entry() {
        let transport = Arc::new(ScriptedTransport::new().failing_disconnect());
        let manager = ConnectionManager::new(transport.clone());

        let connection = manager.connect(&config()).await.unwrap();
        connection.close().await;
        assert_eq!(manager.active_count(), 0);
        assert_eq!(transport.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_dropped_guard_disconnects_in_background() {
        let transport = Arc::new(ScriptedTransport::new());
        let manager = ConnectionManager::new(transport.clone());

        let connection = manager.connect(&config()).await.unwrap();
        drop(connection);
        assert_eq!(manager.active_count(), 0);

        tokio::task::yield_now().await;
        assert_eq!(transport.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_still_disconnects() {
        let transport =
            Arc::new(ScriptedTransport::new().with_call_delay(Duration::from_secs(45)));
        let manager = ConnectionManager::new(transport.clone());

        let attempt = async {
            let connection = manager.connect(&config()).await?;
            let result = connection.call_tool("slow", serde_json::json!({})).await;
            connection.close().await;
            result
        };
        let timed_out = tokio::time::timeout(Duration::from_secs(20), attempt).await;
        assert!(timed_out.is_err());
        assert_eq!(manager.active_count(), 0);

        tokio::task::yield_now().await;
        assert_eq!(transport.connects(), 1);
        assert_eq!(transport.disconnects(), 1);
    }
}
