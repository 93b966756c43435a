//! MCP server configuration and the protocol values this crate consumes.
//!
//! The JSON-RPC envelope and SSE/HTTP framing belong to the transport; only
//! the shapes that cross the [`McpTransport`](crate::transport::McpTransport)
//! boundary are modelled here.

use std::collections::HashMap;

use flowtool_tool_runtime::schema::parameters_from_json_schema;
use flowtool_tool_runtime::{ClassifiedError, ErrorCode, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

// ── Server configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Sse,
    Http,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    #[default]
    None,
    ApiKey,
    Bearer,
}

/// How to reach one remote MCP server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    pub url: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Transport-level timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl McpServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_auth(mut self, auth_type: AuthType, api_key: Option<String>) -> Self {
        self.auth_type = auth_type;
        self.api_key = api_key;
        self
    }

    /// Checks that need no network: an http(s) URL and credentials for the
    /// selected auth type.
    pub fn validate(&self) -> Result<(), ClassifiedError> {
        let url = Url::parse(self.url.trim()).map_err(|e| {
            ClassifiedError::new(
                ErrorCode::InvalidUrl,
                format!("Invalid MCP server URL '{}': {}", self.url, e),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClassifiedError::new(
                ErrorCode::InvalidUrl,
                format!(
                    "MCP server URL must use http or https, got '{}'",
                    url.scheme()
                ),
            ));
        }

        let has_key = self
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if self.auth_type != AuthType::None && !has_key {
            return Err(ClassifiedError::new(
                ErrorCode::MissingAuth,
                format!(
                    "Authentication type '{}' requires an API key",
                    self.auth_type.as_str()
                ),
            ));
        }
        Ok(())
    }
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "none",
            AuthType::ApiKey => "api-key",
            AuthType::Bearer => "bearer",
        }
    }
}

// ── Connection ──────────────────────────────────────────────────────

/// Information about the MCP server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// An established connection, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConnection {
    pub id: String,
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: Value,
}

// ── tools/list ──────────────────────────────────────────────────────

/// Describes a single tool in MCP format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

impl From<&McpToolInfo> for ToolDefinition {
    fn from(info: &McpToolInfo) -> Self {
        Self {
            name: info.name.clone(),
            description: info.description.clone(),
            parameters: parameters_from_json_schema(&info.input_schema),
            category: Some("mcp".to_string()),
        }
    }
}

// ── tools/call ──────────────────────────────────────────────────────

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// All text blocks joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Normalized tool output: a lone text block collapses to a string,
    /// anything else stays a typed block array.
    pub fn into_value(self) -> Value {
        match self.content.as_slice() {
            [ToolContent::Text { text }] => Value::String(text.clone()),
            _ => serde_json::to_value(&self.content).unwrap_or(Value::Null),
        }
    }
}

/// Content block within a tool call result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
}
