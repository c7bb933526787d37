//! File read tool: numbered file contents with optional line windowing.

use async_trait::async_trait;
use serde::Deserialize;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

use crate::workspace::Workspace;

/// Output beyond this many characters keeps only its head and tail.
pub const MAX_OUTPUT_CHARS: usize = 128_000;

pub struct ReadFileTool {
    workspace: Workspace,
    max_chars: usize,
}

#[derive(Deserialize)]
struct ReadArgs {
    path: String,
    offset: Option<usize>,
    limit: Option<usize>,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            max_chars: MAX_OUTPUT_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

/// Render lines `[offset, offset + limit)` (1-indexed) as `NNNNNN|line`.
fn number_lines(text: &str, offset: Option<usize>, limit: Option<usize>) -> String {
    let start = offset.unwrap_or(1).saturating_sub(1);
    text.lines()
        .enumerate()
        .skip(start)
        .take(limit.unwrap_or(usize::MAX))
        .map(|(i, line)| format!("{:6}|{line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep the head and tail of `text`, cut at line boundaries, with a marker
/// in between.
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let half = max_chars / 2;
    let head: String = text.chars().take(half).collect();
    let head = match head.rfind('\n') {
        Some(pos) if pos > 0 => head[..pos].to_string(),
        _ => head,
    };

    let tail: String = text.chars().skip(total - half).collect();
    let tail = match tail.find('\n') {
        Some(pos) => tail[pos + 1..].to_string(),
        None => tail,
    };

    format!("{head}\n\n... [output truncated: {total} chars -> ~{max_chars} chars] ...\n\n{tail}")
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file. Output lines are numbered as 'LINE_NUMBER|LINE_CONTENT' (1-indexed). \
         Use offset and limit to read part of a large file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path, or path relative to the workspace"
                },
                "offset": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "First line to read (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Number of lines to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: ReadArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
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

        let numbered = number_lines(&content, args.offset, args.limit);
        Ok(truncate_middle(&numbered, self.max_chars))
    }
}
