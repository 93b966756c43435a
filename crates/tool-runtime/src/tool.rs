use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::context::ToolExecutionContext;
use crate::error::{ClassifiedError, ErrorCode};

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }
}

/// Element description for `array` parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterItems {
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Fields of each element when the element is an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<ToolParameter>>,
}

/// One parameter of a tool. Forms a tree through `items` / `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterItems>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<ToolParameter>>,
}

impl ToolParameter {
    pub fn new(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            enum_values: None,
            default: None,
            items: None,
            properties: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_items(mut self, items: ParameterItems) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_properties(mut self, properties: Vec<ToolParameter>) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Describes a tool's interface for LLM consumption.
///
/// Provider wire formats are produced by [`crate::schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name, `^[A-Za-z_][A-Za-z0-9_]*$`, at most 64 chars.
    pub name: String,
    /// Human-readable description for the LLM, at most 1024 chars.
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            category: None,
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallKind {
    #[default]
    Function,
}

/// Function name plus the raw JSON argument string emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Represents an LLM requesting execution of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this invocation (used to match results)
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ToolCallKind,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ToolCallKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Parse the argument string. Blank arguments mean "no arguments".
    pub fn parse_arguments(&self) -> Result<Value, ClassifiedError> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(raw).map_err(|e| {
            ClassifiedError::new(
                ErrorCode::ParseError,
                format!(
                    "Invalid JSON arguments for tool '{}': {}",
                    self.function.name, e
                ),
            )
        })
    }
}

/// Outcome of one tool execution. A failed result always carries `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Must match the ToolCall id
    pub tool_call_id: String,
    pub tool_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ClassifiedError>,
    /// Wall-clock execution time in milliseconds.
    #[serde(default, rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCallResult {
    pub fn ok(tool_name: impl Into<String>, result: Value) -> Self {
        Self {
            tool_call_id: String::new(),
            tool_name: tool_name.into(),
            success: true,
            result: Some(result),
            error: None,
            error_details: None,
            duration_ms: None,
        }
    }

    pub fn failed(tool_name: impl Into<String>, error: ClassifiedError) -> Self {
        Self {
            tool_call_id: String::new(),
            tool_name: tool_name.into(),
            success: false,
            result: None,
            error: Some(error.message.clone()),
            error_details: Some(error),
            duration_ms: None,
        }
    }

    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = id.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_details.as_ref().map(|e| e.code)
    }
}

/// The primary extension point: every tool implements this trait.
///
/// Executors report failures as [`ClassifiedError`]; the registry turns both
/// errors and panics into failed [`ToolCallResult`]s.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool's definition (name, description, parameters).
    fn definition(&self) -> ToolDefinition;

    /// Registry key. Defaults to the definition name.
    fn name(&self) -> String {
        self.definition().name
    }

    async fn execute(
        &self,
        args: Value,
        context: &ToolExecutionContext,
    ) -> Result<Value, ClassifiedError>;
}

/// Simple echo tool for testing purposes.
pub struct EchoTool;

#[async_trait]
impl ToolExecutor for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("echo", "Echoes back the input message. For testing.")
            .with_parameter(
                ToolParameter::new("message", ParameterType::String, "The message to echo back")
                    .required(),
            )
            .with_category("testing")
    }

    async fn execute(
        &self,
        args: Value,
        _context: &ToolExecutionContext,
    ) -> Result<Value, ClassifiedError> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClassifiedError::invalid_params("missing 'message' field"))?;

        Ok(Value::String(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_deserialization() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "get_weather",
            "description": "Current weather",
            "parameters": [
                {"name": "city", "type": "string", "description": "City", "required": true},
                {"name": "units", "type": "string", "description": "Units", "enum": ["c", "f"]}
            ]
        }))
        .unwrap();
        assert_eq!(def.parameters.len(), 2);
        assert!(def.parameters[0].required);
        assert!(!def.parameters[1].required);
        assert_eq!(def.parameters[1].enum_values.as_ref().unwrap().len(), 2);
        assert!(def.category.is_none());
    }

    #[test]
    fn test_tool_call_wire_shape() {
        let call = ToolCall::new("call_001", "echo", r#"{"message":"hello"}"#);
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "echo");

        let parsed: ToolCall = serde_json::from_value(json!({
            "id": "call_002",
            "function": {"name": "echo", "arguments": "{}"}
        }))
        .unwrap();
        assert_eq!(parsed.kind, ToolCallKind::Function);
    }

    #[test]
    fn test_parse_arguments() {
        let call = ToolCall::new("c1", "echo", r#"{"message": "hi"}"#);
        assert_eq!(call.parse_arguments().unwrap(), json!({"message": "hi"}));

        let blank = ToolCall::new("c2", "echo", "  ");
        assert_eq!(blank.parse_arguments().unwrap(), json!({}));

        let broken = ToolCall::new("c3", "echo", "{not json");
        let err = broken.parse_arguments().unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
        assert!(err.message.contains("echo"));
    }

    #[test]
    fn test_failed_result_carries_error() {
        let result = ToolCallResult::failed("echo", ClassifiedError::execution("boom"))
            .with_call_id("call_1")
            .with_duration(Duration::from_millis(12));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.error_code(), Some(ErrorCode::ExecutionError));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["toolCallId"], "call_1");
        assert_eq!(json["duration"], 12);
        assert!(json.get("result").is_none());
    }

    #[tokio::test]
    async fn test_echo_tool() {
        let tool = EchoTool;
        assert_eq!(tool.name(), "echo");

        let ctx = ToolExecutionContext::new("org", "user");
        let result = tool
            .execute(json!({"message": "hello world"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!("hello world"));

        let err = tool.execute(json!({}), &ctx).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }
}
