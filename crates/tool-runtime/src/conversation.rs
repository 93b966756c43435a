use crate::provider::ProviderFormat;
use crate::tool::{ToolCall, ToolCallResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Typed content block (Claude-style messages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A message in the conversation history, in either provider dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    /// OpenAI-style tool requests on assistant messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// OpenAI-style `tool` message back-reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text.into())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    /// Concatenated text content, ignoring non-text blocks.
    pub fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Blocks(blocks) => {
                let text: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                (!text.is_empty()).then(|| text.join("\n"))
            }
        }
    }
}

/// Text sent back to the model for one tool result.
///
/// String results go verbatim, other values as JSON. Failures become
/// `{"error", "code", "suggestions"}`.
pub fn tool_result_content(result: &ToolCallResult) -> String {
    if result.success {
        return match &result.result {
            Some(Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => String::new(),
        };
    }

    let message = result.error.as_deref().unwrap_or("Tool execution failed");
    let payload = match &result.error_details {
        Some(details) => json!({
            "error": message,
            "code": details.code,
            "suggestions": details.suggestions,
        }),
        None => json!({ "error": message }),
    };
    payload.to_string()
}

/// Append one executed round: the assistant's tool request followed by the
/// results, in the dialect of `format`.
///
/// `results` must be in the same order as `calls`.
pub fn append_tool_round(
    messages: &mut Vec<ChatMessage>,
    format: ProviderFormat,
    assistant_text: Option<&str>,
    calls: &[ToolCall],
    results: &[ToolCallResult],
) {
    match format {
        ProviderFormat::Claude => {
            let mut blocks = Vec::with_capacity(calls.len() + 1);
            if let Some(text) = assistant_text.filter(|t| !t.is_empty()) {
                blocks.push(ContentBlock::Text {
                    text: text.to_string(),
                });
            }
            blocks.extend(calls.iter().map(|call| ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: call
                    .parse_arguments()
                    .unwrap_or_else(|_| Value::Object(Default::default())),
            }));
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: Some(MessageContent::Blocks(blocks)),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });

            let result_blocks = calls
                .iter()
                .zip(results)
                .map(|(call, result)| ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: tool_result_content(result),
                    is_error: !result.success,
                })
                .collect();
            messages.push(ChatMessage {
                role: Role::User,
                content: Some(MessageContent::Blocks(result_blocks)),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }
        ProviderFormat::OpenAi | ProviderFormat::OpenAiCompatible => {
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: assistant_text.map(|t| MessageContent::Text(t.to_string())),
                tool_calls: calls.to_vec(),
                tool_call_id: None,
            });
            for (call, result) in calls.iter().zip(results) {
                messages.push(ChatMessage::tool(call.id.clone(), tool_result_content(result)));
            }
        }
    }
}
