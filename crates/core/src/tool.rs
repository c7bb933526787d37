//! Tool trait: the abstraction over agent capabilities.
//!
//! A tool is just a name, a parameter schema, and an async `execute`.
//! Validation, isolation and result shaping happen at the dispatch boundary
//! in the agent crate; tools only report content or a fault.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool, produced by a backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID within a step (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Exactly one of content or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success { content: String },
    Failure { error: String },
}

/// The uniform result of dispatching one tool call.
///
/// Serializes as `{tool_call_id, success, content | error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ToolResultRepr", try_from = "ToolResultRepr")]
pub struct ToolResult {
    pub tool_call_id: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: ToolOutcome::Success {
                content: content.into(),
            },
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: ToolOutcome::Failure {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Success { content } => Some(content),
            ToolOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Failure { error } => Some(error),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ToolResultRepr {
    tool_call_id: String,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ToolResult> for ToolResultRepr {
    fn from(result: ToolResult) -> Self {
        let (success, content, error) = match result.outcome {
            ToolOutcome::Success { content } => (true, Some(content), None),
            ToolOutcome::Failure { error } => (false, None, Some(error)),
        };
        Self {
            tool_call_id: result.tool_call_id,
            success,
            content,
            error,
        }
    }
}

impl TryFrom<ToolResultRepr> for ToolResult {
    type Error = String;

    fn try_from(repr: ToolResultRepr) -> std::result::Result<Self, Self::Error> {
        let outcome = match (repr.success, repr.content, repr.error) {
            (true, Some(content), None) => ToolOutcome::Success { content },
            (false, None, Some(error)) => ToolOutcome::Failure { error },
            _ => {
                return Err(
                    "tool result must carry content on success or error on failure, not both"
                        .into(),
                );
            }
        };
        Ok(Self {
            tool_call_id: repr.tool_call_id,
            outcome,
        })
    }
}

/// The core Tool trait.
///
/// Each capability (read_file, bash, ...) implements this trait and is
/// registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "bash", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Built once, then shared read-only (behind an `Arc`) by every run.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Iterate over registered tools in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.values().map(|t| t.as_ref())
    }

    /// All tool definitions, sorted by name so requests are deterministic.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_string())
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].parameters["required"], serde_json::json!(["text"]));
    }

    #[test]
    fn result_serializes_exactly_one_payload() {
        let ok = serde_json::to_value(ToolResult::success("c1", "4")).unwrap();
        assert_eq!(ok, serde_json::json!({"tool_call_id": "c1", "success": true, "content": "4"}));

        let err = serde_json::to_value(ToolResult::failure("c2", "boom")).unwrap();
        assert_eq!(err, serde_json::json!({"tool_call_id": "c2", "success": false, "error": "boom"}));
    }

    #[test]
    fn result_rejects_both_payloads() {
        let json = r#"{"tool_call_id":"c1","success":true,"content":"a","error":"b"}"#;
        assert!(serde_json::from_str::<ToolResult>(json).is_err());

        let json = r#"{"tool_call_id":"c1","success":false}"#;
        assert!(serde_json::from_str::<ToolResult>(json).is_err());
    }

    #[test]
    fn result_accessors() {
        let r = ToolResult::failure("c1", "nope");
        assert!(!r.is_success());
        assert_eq!(r.error(), Some("nope"));
        assert_eq!(r.content(), None);
    }
}
