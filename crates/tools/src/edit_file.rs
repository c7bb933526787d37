//! Exact-match string replacement in an existing file.

use async_trait::async_trait;
use serde::Deserialize;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

use crate::workspace::Workspace;

pub struct EditFileTool {
    workspace: Workspace,
}

#[derive(Deserialize)]
struct EditArgs {
    path: String,
    old_str: String,
    new_str: String,
}

impl EditFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. old_str must match exactly and occur \
         exactly once. Preserve the original indentation."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path, or path relative to the workspace"
                },
                "old_str": {
                    "type": "string",
                    "description": "Exact text to replace (must be unique in the file)"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_str", "new_str"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: EditArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.old_str.is_empty() {
            return Err(ToolError::InvalidArguments("old_str must not be empty".into()));
        }

        let path = self.workspace.resolve(&args.path);
        if !path.exists() {
            return Err(ToolError::failed(
                self.name(),
                format!("File not found: {}", args.path),
            ));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to read file: {e}")))?;

        match content.matches(args.old_str.as_str()).count() {
            0 => Err(ToolError::failed(
                self.name(),
                format!("Text not found in file: {}", args.old_str),
            )),
            1 => {
                let updated = content.replacen(&args.old_str, &args.new_str, 1);
                tokio::fs::write(&path, updated).await.map_err(|e| {
                    ToolError::failed(self.name(), format!("Failed to write file: {e}"))
                })?;
                Ok(format!("Successfully edited {}", path.display()))
            }
            n => Err(ToolError::failed(
                self.name(),
                format!("old_str occurs {n} times; include more surrounding context"),
            )),
        }
    }
}
