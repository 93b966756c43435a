//! End-to-end behavior of the tool-calling engine through its public API.

use async_trait::async_trait;
use flowtool_tool_runtime::{
    convert_tools, resolve_variables, validate_tool_definition, validate_variable_refs,
    ChatMessage, ChatProvider, ChatRequest, ChatResponse, ClassifiedError, EchoTool, ErrorCode,
    FunctionCallingError, FunctionCallingLoop, FunctionCallingRequest, ParameterType, ToolCall,
    ToolDefinition, ToolExecutionContext, ToolExecutor, ToolParameter, ToolRegistry,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Requests the echo tool on every call.
struct RelentlessProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatProvider for RelentlessProvider {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, ClassifiedError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatResponse::with_tool_calls(vec![ToolCall::new(
            format!("call_{n}"),
            "echo",
            r#"{"message":"again"}"#,
        )]))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Counts executions of the echo tool.
struct CountingEcho {
    executions: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolExecutor for CountingEcho {
    fn definition(&self) -> ToolDefinition {
        EchoTool.definition()
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        context: &ToolExecutionContext,
    ) -> Result<serde_json::Value, ClassifiedError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        EchoTool.execute(args, context).await
    }
}

fn ctx() -> ToolExecutionContext {
    ToolExecutionContext::new("org-1", "user-1")
}

#[test]
fn weather_definition_is_valid() {
    let def = ToolDefinition::new("get_weather", "Get the current weather for a city")
        .with_parameter(ToolParameter::new("city", ParameterType::String, "City name").required());

    let report = validate_tool_definition(&def);
    assert!(report.valid);
    assert!(report.errors.is_empty());

    let openai = convert_tools(&[def.clone()], "openai");
    assert_eq!(openai[0]["function"]["parameters"]["required"], json!(["city"]));
    let claude = convert_tools(&[def], "claude");
    assert_eq!(claude[0]["input_schema"]["required"], json!(["city"]));
}

#[test]
fn template_resolution_and_missing_refs() {
    let args = json!({"msg": "{{user.name}}"});

    let with_user = ctx().with_variables(json!({"user": {"name": "Ana"}}));
    assert!(validate_variable_refs(&args, &with_user.variables).is_empty());
    assert_eq!(resolve_variables(&args, &with_user.variables), json!({"msg": "Ana"}));

    let empty = ctx();
    assert_eq!(validate_variable_refs(&args, &empty.variables), vec!["user.name"]);
}

#[tokio::test]
async fn missing_tool_is_a_failed_result() {
    let mut registry = ToolRegistry::new();
    registry.register(EchoTool);

    let result = registry.execute("missing_tool", json!({}), &ctx()).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("missing_tool"));
    assert_eq!(
        result.error_details.map(|e| e.code),
        Some(ErrorCode::ToolNotFound)
    );
}

#[tokio::test]
async fn round_budget_exceeded_after_one_round() {
    let executions = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(CountingEcho {
        executions: executions.clone(),
    });

    let provider = Arc::new(RelentlessProvider {
        calls: AtomicUsize::new(0),
    });
    let function_loop =
        FunctionCallingLoop::new(provider.clone(), Arc::new(registry)).with_max_rounds(1);

    let err = function_loop
        .run(
            FunctionCallingRequest::new(vec![ChatMessage::user("keep going")]),
            &ctx(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FunctionCallingError::RoundBudgetExceeded { max_rounds: 1 }
    ));
    assert!(err.to_string().contains("round budget exceeded"));
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}
