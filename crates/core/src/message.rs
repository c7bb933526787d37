//! Message domain types.
//!
//! These are the value objects that make up a run's history:
//! system prompt → user message → assistant replies and tool results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolCall, ToolOutcome, ToolResult};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A single message in a run's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Extended reasoning attached to an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// If this is a tool result, the name of the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (e.g. `"summary": true` on compaction output)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            thinking: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::assistant(content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg.name = Some(tool_name.into());
        msg
    }

    /// Build the history entry for a dispatched tool call.
    ///
    /// Failures are rendered as `Error: <detail>` so the model can recover.
    pub fn from_tool_result(result: &ToolResult, tool_name: &str) -> Self {
        let (content, success) = match &result.outcome {
            ToolOutcome::Success { content } => (content.clone(), true),
            ToolOutcome::Failure { error } => (format!("Error: {error}"), false),
        };
        let mut msg = Self::tool_result(&result.tool_call_id, tool_name, content);
        msg.metadata
            .insert("success".into(), serde_json::Value::Bool(success));
        msg
    }

    /// Whether this is an assistant message that requested at least one tool.
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Whether this message was produced by history compaction.
    pub fn is_summary(&self) -> bool {
        self.metadata
            .get("summary")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Check the tool-ordering invariant over a history.
///
/// Every `Role::Tool` message must belong to the contiguous run of tool
/// messages that directly follows the assistant message which requested its
/// `tool_call_id`. Returns the index of the first offending message.
pub fn find_ordering_violation(messages: &[Message]) -> Option<usize> {
    let mut open_calls: Vec<&str> = Vec::new();
    for (idx, msg) in messages.iter().enumerate() {
        match msg.role {
            Role::Tool => {
                let Some(id) = msg.tool_call_id.as_deref() else {
                    return Some(idx);
                };
                match open_calls.iter().position(|c| *c == id) {
                    Some(pos) => {
                        open_calls.remove(pos);
                    }
                    None => return Some(idx),
                }
            }
            _ => {
                open_calls = msg.tool_calls.iter().map(|tc| tc.id.as_str()).collect();
            }
        }
    }
    None
}
