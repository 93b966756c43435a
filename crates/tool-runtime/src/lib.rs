//! Tool-calling orchestration: tool schemas, `{{variable}}` templating, error
//! classification with retry, the tool registry and the function-calling loop.

pub mod context;
pub mod conversation;
pub mod error;
pub mod messages;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod runtime;
pub mod schema;
pub mod tool;
pub mod variables;

pub use context::{AiConfig, ToolExecutionContext};
pub use conversation::{ChatMessage, ContentBlock, MessageContent, Role};
pub use error::{
    classify_error, ClassifiedError, ErrorCategory, ErrorCode, ErrorMetadata,
    RETRYABLE_ERROR_CODES,
};
pub use provider::{ChatProvider, ChatRequest, ChatResponse, ProviderFormat};
pub use registry::ToolRegistry;
pub use retry::{
    calculate_retry_delay, is_retryable_error, with_retry, with_retry_and_timeout,
    with_retry_result, with_timeout, RetryConfig, RetryOutcome,
};
pub use runtime::{
    FunctionCallingError, FunctionCallingLoop, FunctionCallingOutcome, FunctionCallingRequest,
    LoopConfig, ToolCallRecord,
};
pub use schema::{
    convert_tools, to_claude_format, to_openai_format, to_provider_schema,
    validate_tool_definition, ToolChoice, ValidationReport,
};
pub use tool::{
    EchoTool, FunctionCall, ParameterItems, ParameterType, ToolCall, ToolCallResult,
    ToolDefinition, ToolExecutor, ToolParameter,
};
pub use variables::{
    contains_variable_ref, extract_variable_refs, resolve_variable_path, resolve_variable_string,
    resolve_variables, validate_variable_refs,
};
