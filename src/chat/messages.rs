use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, Role, ToolCall};

/// A turn of the conversation as the client keeps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
}

/// A tool call made during an assistant turn, with its result once known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_invocations: Vec::new(),
        }
    }
}

/// Converts client history into wire messages. Completed tool invocations
/// expand into an assistant tool-call message followed by one tool result
/// message each; invocations still waiting on a result are dropped.
pub fn to_wire_messages(history: &[ConversationMessage]) -> Result<Vec<ChatMessage>, ApiError> {
    let mut out = Vec::with_capacity(history.len());

    for message in history {
        match message.role {
            Role::Tool => {
                return Err(ApiError::BadRequest(
                    "Tool messages must be sent as assistant tool invocations".to_string(),
                ));
            }
            Role::Assistant => {
                let completed: Vec<&ToolInvocation> = message
                    .tool_invocations
                    .iter()
                    .filter(|inv| inv.result.is_some())
                    .collect();

                if completed.is_empty() {
                    out.push(ChatMessage::new(Role::Assistant, message.content.clone()));
                    continue;
                }

                out.push(ChatMessage {
                    role: Role::Assistant,
                    content: Some(message.content.clone()).filter(|c| !c.is_empty()),
                    tool_calls: completed
                        .iter()
                        .map(|inv| ToolCall::new(&inv.id, &inv.name, encode_arguments(&inv.arguments)))
                        .collect(),
                    tool_call_id: None,
                });

                for inv in completed {
                    let result = inv.result.as_ref().map(Value::to_string).unwrap_or_default();
                    out.push(ChatMessage::tool_result(&inv.id, result));
                }
            }
            role => out.push(ChatMessage::new(role, message.content.clone())),
        }
    }

    Ok(out)
}

fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}
