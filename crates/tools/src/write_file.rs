//! File write tool: create or overwrite files inside the workspace.

use async_trait::async_trait;
use serde::Deserialize;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

use crate::workspace::Workspace;

pub struct WriteFileTool {
    workspace: Workspace,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing it completely if it exists. \
         Read existing files first and prefer edit_file for small changes."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path, or path relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "The complete file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: WriteArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let path = self.workspace.resolve(&args.path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::failed(self.name(), format!("Failed to create directory: {e}"))
            })?;
        }

        tokio::fs::write(&path, &args.content)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("Failed to write file: {e}")))?;

        Ok(format!(
            "Successfully wrote {} bytes to {}",
            args.content.len(),
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition() {
        let tool = WriteFileTool::new(Workspace::new("/tmp"));
        assert_eq!(tool.name(), "write_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path", "content"]));
    }

    #[tokio::test]
    async fn write_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Workspace::new(dir.path()));

        let out = tool
            .execute(serde_json::json!({"path": "output.txt", "content": "Hello from Stepwise!"}))
            .await
            .unwrap();
        assert!(out.contains("20 bytes"));

        let written = std::fs::read_to_string(dir.path().join("output.txt")).unwrap();
        assert_eq!(written, "Hello from Stepwise!");
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Workspace::new(dir.path()));

        tool.execute(serde_json::json!({"path": "a/b/c/deep.txt", "content": "deep"}))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/c/deep.txt")).unwrap(),
            "deep"
        );
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("existing.txt");
        std::fs::write(&file, "old content").unwrap();

        WriteFileTool::new(Workspace::new(dir.path()))
            .execute(serde_json::json!({"path": file.to_str().unwrap(), "content": "new"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "new");
    }

    #[tokio::test]
    async fn missing_content_is_invalid() {
        let tool = WriteFileTool::new(Workspace::new("/tmp"));
        let err = tool
            .execute(serde_json::json!({"path": "x.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
