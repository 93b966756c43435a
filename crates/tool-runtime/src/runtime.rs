use crate::context::ToolExecutionContext;
use crate::conversation::{append_tool_round, ChatMessage};
use crate::error::ClassifiedError;
use crate::provider::{ChatProvider, ChatRequest, ChatResponse};
use crate::registry::ToolRegistry;
use crate::schema::{convert_tools, ToolChoice};
use crate::tool::{ToolCall, ToolCallResult, ToolDefinition};
use flowtool_core::config::ToolLoopConfig;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Rounds of tool execution allowed before the loop fails.
    pub max_tool_call_rounds: u32,
    /// Upper bound for a single tool execution.
    pub tool_call_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_tool_call_rounds: 10,
            tool_call_timeout: Duration::from_millis(60_000),
        }
    }
}

impl From<&ToolLoopConfig> for LoopConfig {
    fn from(config: &ToolLoopConfig) -> Self {
        Self {
            max_tool_call_rounds: config.max_tool_call_rounds,
            tool_call_timeout: Duration::from_millis(config.tool_call_timeout_ms),
        }
    }
}

/// Input to [`FunctionCallingLoop::run`].
#[derive(Debug, Clone, Default)]
pub struct FunctionCallingRequest {
    pub messages: Vec<ChatMessage>,
    /// Tools to advertise. `None` advertises every registered tool.
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl FunctionCallingRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// One executed tool call and the round it ran in (1-based).
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub round: u32,
    pub call: ToolCall,
    pub result: ToolCallResult,
}

#[derive(Debug, Clone)]
pub struct FunctionCallingOutcome {
    /// The final model response (no tool calls).
    pub response: ChatResponse,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Rounds of tool execution performed.
    pub rounds: u32,
    /// Full conversation, including tool rounds and the final answer.
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, thiserror::Error)]
pub enum FunctionCallingError {
    #[error("Tool call round budget exceeded: the model kept requesting tools after {max_rounds} rounds")]
    RoundBudgetExceeded { max_rounds: u32 },
    #[error("Chat provider error: {0}")]
    Provider(ClassifiedError),
}

/// Drives model ↔ tool rounds until the model answers without tool calls.
///
/// Flow: messages → model → tool calls → registry (concurrently) → results
/// appended in the provider's dialect → model → ... → final response.
pub struct FunctionCallingLoop {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    config: LoopConfig,
}

impl FunctionCallingLoop {
    pub fn new(provider: Arc<dyn ChatProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            config: LoopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.config.max_tool_call_rounds = max;
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub async fn run(
        &self,
        request: FunctionCallingRequest,
        context: &ToolExecutionContext,
    ) -> Result<FunctionCallingOutcome, FunctionCallingError> {
        let format = self.provider.format();
        let definitions = request
            .tools
            .unwrap_or_else(|| self.registry.all_definitions());
        let tools = convert_tools(&definitions, format);
        let mut tool_choice = request.tool_choice;

        let mut messages = request.messages;
        let mut records = Vec::new();
        let mut rounds = 0u32;

        loop {
            debug!(
                provider = self.provider.provider_name(),
                round = rounds,
                messages = messages.len(),
                "Calling model"
            );
            let response = self
                .provider
                .chat(ChatRequest {
                    messages: messages.clone(),
                    tools: tools.clone(),
                    tool_choice: tool_choice.as_ref().and_then(|c| c.render(format)),
                    model: request.model.clone(),
                    temperature: request.temperature,
                    max_tokens: request.max_tokens,
                })
                .await
                .map_err(FunctionCallingError::Provider)?;

            if !response.has_tool_calls() {
                info!(rounds, tool_calls = records.len(), "Function calling complete");
                if let Some(text) = &response.content {
                    messages.push(ChatMessage::assistant(text.clone()));
                }
                return Ok(FunctionCallingOutcome {
                    response,
                    tool_calls: records,
                    rounds,
                    messages,
                });
            }

            if rounds >= self.config.max_tool_call_rounds {
                warn!(
                    max_rounds = self.config.max_tool_call_rounds,
                    "Model still requesting tools after round budget"
                );
                return Err(FunctionCallingError::RoundBudgetExceeded {
                    max_rounds: self.config.max_tool_call_rounds,
                });
            }
            rounds += 1;

            info!(round = rounds, count = response.tool_calls.len(), "Executing tool calls");
            let results = self.execute_round(&response.tool_calls, context).await;

            append_tool_round(
                &mut messages,
                format,
                response.content.as_deref(),
                &response.tool_calls,
                &results,
            );
            records.extend(
                response
                    .tool_calls
                    .into_iter()
                    .zip(results)
                    .map(|(call, result)| ToolCallRecord {
                        round: rounds,
                        call,
                        result,
                    }),
            );

            // A forced choice applies to the first request only.
            if matches!(
                tool_choice,
                Some(ToolChoice::Required) | Some(ToolChoice::Function(_))
            ) {
                tool_choice = Some(ToolChoice::Auto);
            }
        }
    }

    /// Execute all calls of one round concurrently; results keep call order.
    async fn execute_round(
        &self,
        calls: &[ToolCall],
        context: &ToolExecutionContext,
    ) -> Vec<ToolCallResult> {
        join_all(calls.iter().map(|call| self.execute_call(call, context))).await
    }

    async fn execute_call(&self, call: &ToolCall, context: &ToolExecutionContext) -> ToolCallResult {
        let name = call.name();
        let args = match call.parse_arguments() {
            Ok(args) => args,
            Err(err) => {
                warn!(tool = %name, call_id = %call.id, "Unparsable tool arguments");
                return ToolCallResult::failed(name, err.with_locale(context.locale))
                    .with_call_id(call.id.clone());
            }
        };

        let timeout = self.config.tool_call_timeout;
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.registry.execute(name, args, context)).await {
            Ok(result) => result.with_call_id(call.id.clone()),
            Err(_) => {
                warn!(tool = %name, timeout_ms = timeout.as_millis() as u64, "Tool call timed out");
                ToolCallResult::failed(
                    name,
                    ClassifiedError::timeout(timeout).with_locale(context.locale),
                )
                .with_call_id(call.id.clone())
                .with_duration(started.elapsed())
            }
        }
    }
}
