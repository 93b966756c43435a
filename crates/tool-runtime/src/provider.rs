use crate::conversation::ChatMessage;
use crate::error::ClassifiedError;
use crate::tool::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Tool wire format spoken by a chat provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderFormat {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

/// Providers known to speak the OpenAI chat-completions tool format.
const OPENAI_COMPATIBLE_PROVIDERS: &[&str] = &[
    "openai-compatible",
    "azure",
    "deepseek",
    "shensuan",
    "qwen",
    "dashscope",
    "moonshot",
    "zhipu",
    "ollama",
    "groq",
    "mistral",
    "openrouter",
];

impl ProviderFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFormat::OpenAi => "openai",
            ProviderFormat::Claude => "claude",
            ProviderFormat::OpenAiCompatible => "openai-compatible",
        }
    }

    /// Classify a provider name. Unrecognized names use the OpenAI format.
    pub fn for_provider(provider: &str) -> Self {
        let name = provider.trim().to_lowercase();
        if name.contains("claude") || name.contains("anthropic") {
            ProviderFormat::Claude
        } else if OPENAI_COMPATIBLE_PROVIDERS.contains(&name.as_str()) {
            ProviderFormat::OpenAiCompatible
        } else {
            ProviderFormat::OpenAi
        }
    }

    pub fn is_claude(&self) -> bool {
        matches!(self, ProviderFormat::Claude)
    }
}

/// Lenient parse of a format name; unknown names fall back to OpenAI.
impl From<&str> for ProviderFormat {
    fn from(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => ProviderFormat::Claude,
            "openai-compatible" | "openai_compatible" => ProviderFormat::OpenAiCompatible,
            _ => ProviderFormat::OpenAi,
        }
    }
}

impl fmt::Display for ProviderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model invocation. `tools` and `tool_choice` are already in the
/// provider's wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: Some("stop".into()),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
            finish_reason: Some("tool_calls".into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Chat backend driven by the function-calling loop.
///
/// Defined here, next to its consumer. REST clients for concrete providers
/// implement it outside this crate.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClassifiedError>;

    /// Provider name for logging and format detection (e.g. "claude", "openai").
    fn provider_name(&self) -> &str;

    fn format(&self) -> ProviderFormat {
        ProviderFormat::for_provider(self.provider_name())
    }
}

/// Scripted chat provider for testing the loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued responses in order, then the fallback response.
    pub struct MockChatProvider {
        name: String,
        responses: Mutex<VecDeque<Result<ChatResponse, ClassifiedError>>>,
        fallback: Mutex<ChatResponse>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockChatProvider {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                responses: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(ChatResponse::text("")),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn queue_response(&self, response: ChatResponse) {
            self.responses.lock().unwrap().push_back(Ok(response));
        }

        pub fn queue_error(&self, error: ClassifiedError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        pub fn queue_text(&self, text: &str) {
            self.queue_response(ChatResponse::text(text));
        }

        pub fn queue_tool_calls(&self, calls: Vec<ToolCall>) {
            self.queue_response(ChatResponse::with_tool_calls(calls));
        }

        /// Every call without a queued response requests this tool.
        pub fn always_tool_call(&self, call: ToolCall) {
            *self.fallback.lock().unwrap() = ChatResponse::with_tool_calls(vec![call]);
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatProvider for MockChatProvider {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClassifiedError> {
            self.requests.lock().unwrap().push(request);
            match self.responses.lock().unwrap().pop_front() {
                Some(response) => response,
                None => Ok(self.fallback.lock().unwrap().clone()),
            }
        }

        fn provider_name(&self) -> &str {
            &self.name
        }
    }
}
