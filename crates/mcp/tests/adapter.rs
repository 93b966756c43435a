//! The MCP adapter driven through the registry and the function-calling loop.

use async_trait::async_trait;
use flowtool_mcp::{
    CallToolResult, McpConnection, McpError, McpServerConfig, McpToolExecutor, McpToolInfo,
    McpTransport, ServerInfo,
};
use flowtool_tool_runtime::provider::mock::MockChatProvider;
use flowtool_tool_runtime::{
    ChatMessage, ErrorCode, FunctionCallingLoop, FunctionCallingRequest, LoopConfig, RetryConfig,
    ToolCall, ToolExecutionContext, ToolRegistry,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Greets whoever is named in the `name` argument. The first `flaky`
/// connects are refused; every greeting takes `call_delay`.
#[derive(Default)]
struct GreeterTransport {
    flaky: usize,
    call_delay: Option<Duration>,
    connects: AtomicUsize,
    open: AtomicUsize,
    received: Mutex<Vec<Value>>,
}

#[async_trait]
impl McpTransport for GreeterTransport {
    async fn connect(&self, _config: &McpServerConfig) -> Result<McpConnection, McpError> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst);
        if n < self.flaky {
            return Err(McpError::ConnectionFailed("connect ECONNREFUSED 10.0.0.7:443".into()));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(McpConnection {
            id: format!("greeter-{n}"),
            server_info: ServerInfo {
                name: "greeter".into(),
                version: None,
            },
            capabilities: json!({}),
        })
    }

    async fn list_tools(&self, _connection_id: &str) -> Result<Vec<McpToolInfo>, McpError> {
        Ok(vec![McpToolInfo {
            name: "greet".into(),
            description: "Greet someone".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"name": {"type": "string", "description": "Who to greet"}},
                "required": ["name"]
            }),
        }])
    }

    async fn call_tool(
        &self,
        _connection_id: &str,
        _tool_name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, McpError> {
        self.received.lock().unwrap().push(arguments.clone());
        if let Some(delay) = self.call_delay {
            tokio::time::sleep(delay).await;
        }
        let name = arguments["name"].as_str().unwrap_or("stranger");
        Ok(CallToolResult::text(format!("Hello, {name}!")))
    }

    async fn disconnect(&self, _connection_id: &str) -> Result<(), McpError> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn mcp_call(id: &str) -> ToolCall {
    ToolCall::new(
        id,
        "mcp_tool",
        json!({
            "serverConfig": {"url": "https://greeter.example.com/sse", "transport": "sse"},
            "toolName": "greet",
            "toolArgs": {"name": "{{user.name}}"}
        })
        .to_string(),
    )
}

fn fast_executor(transport: Arc<GreeterTransport>) -> McpToolExecutor {
    McpToolExecutor::new(transport).with_retry_config(
        RetryConfig::new(2).with_delays(Duration::from_millis(5), Duration::from_millis(20)),
    )
}

#[tokio::test(start_paused = true)]
async fn loop_calls_remote_tool_with_resolved_arguments() {
    let transport = Arc::new(GreeterTransport {
        flaky: 1,
        ..Default::default()
    });
    let mut registry = ToolRegistry::new();
    registry.register(fast_executor(transport.clone()));

    let provider = Arc::new(MockChatProvider::new("openai"));
    provider.queue_tool_calls(vec![mcp_call("call_1")]);
    provider.queue_text("Greeted Ana.");

    let ctx = ToolExecutionContext::new("org-1", "user-1")
        .with_variables(json!({"user": {"name": "Ana"}}));
    let outcome = FunctionCallingLoop::new(provider.clone(), Arc::new(registry))
        .run(
            FunctionCallingRequest::new(vec![ChatMessage::user("say hi to me")]),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 1);
    let record = &outcome.tool_calls[0];
    assert!(record.result.success);
    assert_eq!(record.result.result, Some(json!("Hello, Ana!")));
    assert_eq!(*transport.received.lock().unwrap(), vec![json!({"name": "Ana"})]);
    // One refused connect, then a successful one.
    assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
    assert_eq!(transport.open.load(Ordering::SeqCst), 0);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn missing_variable_fails_without_connecting() {
    let transport = Arc::new(GreeterTransport::default());
    let mut registry = ToolRegistry::new();
    registry.register(fast_executor(transport.clone()));

    let args = mcp_call("call_1").parse_arguments().unwrap();
    let ctx = ToolExecutionContext::new("org-1", "user-1");
    let result = registry.execute("mcp_tool", args, &ctx).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("user.name"));
    assert_eq!(result.error_code(), Some(ErrorCode::InvalidParams));
    assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_report_unreachable() {
    let transport = Arc::new(GreeterTransport {
        flaky: usize::MAX,
        ..Default::default()
    });
    let mut registry = ToolRegistry::new();
    registry.register(fast_executor(transport.clone()));

    let args = mcp_call("call_1").parse_arguments().unwrap();
    let ctx = ToolExecutionContext::new("org-1", "user-1")
        .with_variables(json!({"user": {"name": "Ana"}}));
    let result = registry.execute("mcp_tool", args, &ctx).await;

    assert!(!result.success);
    assert_eq!(result.error_code(), Some(ErrorCode::Unreachable));
    let details = result.error_details.unwrap();
    assert!(details.retryable);
    assert!(!details.suggestions.is_empty());
    assert_eq!(transport.connects.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn discovered_tools_register_under_their_own_names() {
    let transport = Arc::new(GreeterTransport::default());
    let executor = fast_executor(transport.clone());
    let config = McpServerConfig::new("https://greeter.example.com/sse");

    let mut registry = ToolRegistry::new();
    for tool in executor.remote_tools(&config).await.unwrap() {
        registry.register(tool);
    }
    assert_eq!(registry.names(), vec!["greet".to_string()]);

    let ctx = ToolExecutionContext::new("org-1", "user-1");
    let result = registry.execute("greet", json!({"name": "Bo"}), &ctx).await;
    assert_eq!(result.result, Some(json!("Hello, Bo!")));
    assert_eq!(transport.open.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn loop_timeout_still_closes_the_connection() {
    let transport = Arc::new(GreeterTransport {
        call_delay: Some(Duration::from_secs(45)),
        ..Default::default()
    });
    let mut registry = ToolRegistry::new();
    registry.register(fast_executor(transport.clone()));

    let provider = Arc::new(MockChatProvider::new("openai"));
    provider.queue_tool_calls(vec![mcp_call("call_1")]);
    provider.queue_text("The greeter is slow today.");

    let ctx = ToolExecutionContext::new("org-1", "user-1")
        .with_variables(json!({"user": {"name": "Ana"}}));
    let outcome = FunctionCallingLoop::new(provider, Arc::new(registry))
        .with_config(LoopConfig {
            max_tool_call_rounds: 10,
            tool_call_timeout: Duration::from_secs(20),
        })
        .run(
            FunctionCallingRequest::new(vec![ChatMessage::user("say hi to me")]),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(outcome.tool_calls[0].result.error_code(), Some(ErrorCode::Timeout));

    tokio::task::yield_now().await;
    assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    assert_eq!(transport.open.load(Ordering::SeqCst), 0);
}
