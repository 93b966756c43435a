//! Remote MCP tools exposed as [`ToolExecutor`]s.
//!
//! Every call validates its configuration and `{{variable}}` references
//! before touching the network, then runs connect → callTool → disconnect
//! as one retryable attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowtool_core::config::RetryDefaults;
use flowtool_tool_runtime::retry::{with_retry, with_timeout, RetryConfig};
use flowtool_tool_runtime::tool::{ParameterType, ToolParameter};
use flowtool_tool_runtime::variables::{resolve_variables, validate_variable_refs};
use flowtool_tool_runtime::{
    ClassifiedError, ErrorCode, ToolDefinition, ToolExecutionContext, ToolExecutor,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::connection::ConnectionManager;
use crate::transport::McpTransport;
use crate::types::{McpServerConfig, McpToolInfo};

/// Registry name of the generic MCP executor.
pub const MCP_TOOL_NAME: &str = "mcp_tool";

/// Arguments accepted by `mcp_tool`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCallRequest {
    #[serde(default)]
    pub server_config: Option<McpServerConfig>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_args: Value,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry_on_error: Option<bool>,
}

/// Per-call overrides of the executor defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
    pub retry_on_error: Option<bool>,
}

#[derive(Clone)]
pub struct McpToolExecutor {
    connections: Arc<ConnectionManager>,
    retry: RetryConfig,
    /// Bound for each connect and each callTool.
    timeout: Duration,
}

impl McpToolExecutor {
    pub fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self::from_defaults(transport, &RetryDefaults::default())
    }

    pub fn from_defaults(transport: Arc<dyn McpTransport>, defaults: &RetryDefaults) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new(transport)),
            retry: RetryConfig::from(defaults),
            timeout: Duration::from_millis(defaults.timeout_ms),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    fn retry_for(&self, options: &CallOptions) -> RetryConfig {
        let mut retry = self.retry.clone();
        if let Some(max) = options.max_retries {
            retry.max_retries = max;
        }
        if options.retry_on_error == Some(false) {
            retry.max_retries = 0;
        }
        retry
    }

    /// Validate, resolve templates and call `tool_name` on the server.
    pub async fn call(
        &self,
        config: &McpServerConfig,
        tool_name: &str,
        tool_args: &Value,
        options: CallOptions,
        context: &ToolExecutionContext,
    ) -> Result<Value, ClassifiedError> {
        config.validate()?;

        let missing = validate_variable_refs(tool_args, &context.variables);
        if !missing.is_empty() {
            return Err(ClassifiedError::invalid_params(format!(
                "Missing variables: {}",
                missing.join(", ")
            )));
        }
        let arguments = resolve_variables(tool_args, &context.variables);

        if context.test_mode {
            debug!(server = %config.url, tool = %tool_name, "Test mode: skipping MCP call");
            return Ok(json!({
                "testMode": true,
                "server": config.url,
                "toolName": tool_name,
                "arguments": arguments,
                "message": format!("Test mode: would call MCP tool '{}'", tool_name),
            }));
        }

        let retry = self.retry_for(&options);
        let timeout = options.timeout.unwrap_or(self.timeout);
        info!(
            server = %config.url,
            tool = %tool_name,
            max_retries = retry.max_retries,
            "Calling MCP tool"
        );
        with_retry(
            || self.call_once(config, tool_name, arguments.clone(), timeout),
            &retry,
        )
        .await
    }

    /// One attempt. The connection is closed before returning, or in the
    /// background if this future is dropped mid-call.
    async fn call_once(
        &self,
        config: &McpServerConfig,
        tool_name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, ClassifiedError> {
        let connection = with_timeout(self.connections.connect(config), timeout).await?;
        let outcome = with_timeout(connection.call_tool(tool_name, arguments), timeout).await;
        connection.close().await;

        let result = outcome?;
        if result.is_error {
            let text = result.joined_text();
            let message = if text.is_empty() {
                format!("MCP tool '{}' reported an error", tool_name)
            } else {
                text
            };
            return Err(ClassifiedError::new(ErrorCode::ExecutionError, message));
        }
        Ok(result.into_value())
    }

    /// List the server's tools as definitions the model can be offered.
    pub async fn discover_tools(
        &self,
        config: &McpServerConfig,
    ) -> Result<Vec<ToolDefinition>, ClassifiedError> {
        Ok(self
            .list_remote_tools(config)
            .await?
            .iter()
            .map(ToolDefinition::from)
            .collect())
    }

    /// One executor per remote tool, bound to `config`.
    pub async fn remote_tools(
        &self,
        config: &McpServerConfig,
    ) -> Result<Vec<RemoteMcpTool>, ClassifiedError> {
        Ok(self
            .list_remote_tools(config)
            .await?
            .into_iter()
            .map(|info| RemoteMcpTool {
                executor: self.clone(),
                config: config.clone(),
                info,
            })
            .collect())
    }

    async fn list_remote_tools(
        &self,
        config: &McpServerConfig,
    ) -> Result<Vec<McpToolInfo>, ClassifiedError> {
        config.validate()?;
        let timeout = self.timeout;
        let tools = with_retry(
            || async move {
                let connection = with_timeout(self.connections.connect(config), timeout).await?;
                let listed = with_timeout(connection.list_tools(), timeout).await;
                connection.close().await;
                listed
            },
            &self.retry,
        )
        .await?;
        info!(server = %config.url, count = tools.len(), "Discovered MCP tools");
        Ok(tools)
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            MCP_TOOL_NAME,
            "Call a tool on a remote MCP server. Arguments may reference workflow variables with {{path}}.",
        )
        .with_parameter(
            ToolParameter::new("serverConfig", ParameterType::Object, "MCP server connection settings")
                .required()
                .with_properties(vec![
                    ToolParameter::new("url", ParameterType::String, "Server URL (http or https)")
                        .required(),
                    ToolParameter::new("transport", ParameterType::String, "Transport type")
                        .with_enum(vec![json!("sse"), json!("http")]),
                    ToolParameter::new("authType", ParameterType::String, "Authentication type")
                        .with_enum(vec![json!("none"), json!("api-key"), json!("bearer")]),
                    ToolParameter::new("apiKey", ParameterType::String, "API key or bearer token"),
                ]),
        )
        .with_parameter(
            ToolParameter::new("toolName", ParameterType::String, "Name of the remote tool")
                .required(),
        )
        .with_parameter(ToolParameter::new(
            "toolArgs",
            ParameterType::Object,
            "Arguments for the remote tool",
        ))
        .with_parameter(ToolParameter::new(
            "maxRetries",
            ParameterType::Number,
            "Retries after the first attempt",
        ))
        .with_parameter(ToolParameter::new(
            "timeoutMs",
            ParameterType::Number,
            "Timeout for each connect and call, in milliseconds",
        ))
        .with_parameter(ToolParameter::new(
            "retryOnError",
            ParameterType::Boolean,
            "Retry transient failures",
        ))
        .with_category("mcp")
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> Result<Value, ClassifiedError> {
        let request: McpCallRequest = serde_json::from_value(args).map_err(|e| {
            ClassifiedError::invalid_params(format!("Invalid {} arguments: {}", MCP_TOOL_NAME, e))
        })?;

        let config = request
            .server_config
            .ok_or_else(|| ClassifiedError::invalid_config("MCP server configuration is required"))?;
        let tool_name = request
            .tool_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ClassifiedError::invalid_config("MCP tool name is required"))?;

        let options = CallOptions {
            max_retries: request.max_retries,
            timeout: request.timeout_ms.map(Duration::from_millis),
            retry_on_error: request.retry_on_error,
        };
        self.call(&config, &tool_name, &request.tool_args, options, context)
            .await
    }
}

/// A single discovered remote tool, callable under its own name.
#[derive(Clone)]
pub struct RemoteMcpTool {
    executor: McpToolExecutor,
    config: McpServerConfig,
    info: McpToolInfo,
}

impl RemoteMcpTool {
    pub fn info(&self) -> &McpToolInfo {
        &self.info
    }
}

#[async_trait]
impl ToolExecutor for RemoteMcpTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::from(&self.info)
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> Result<Value, ClassifiedError> {
        self.executor
            .call(
                &self.config,
                &self.info.name,
                &args,
                CallOptions::default(),
                context,
            )
            .await
    }
}
