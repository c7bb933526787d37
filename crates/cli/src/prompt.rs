//! System prompt assembly.

use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Stepwise, an autonomous assistant that completes \
tasks by calling tools. Work step by step: inspect before you change things, verify your work, \
and reply with a concise final answer once the task is done.";

const WORKSPACE_HEADING: &str = "Current Workspace";

/// Load the prompt from `path` if given, else use the built-in one.
pub fn load_system_prompt(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read system prompt {}: {e}", path.display())),
        None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
    }
}

/// Append a workspace section unless the prompt already has one.
pub fn with_workspace_section(prompt: &str, workspace: &Path) -> String {
    if prompt.contains(WORKSPACE_HEADING) {
        return prompt.to_string();
    }
    format!(
        "{prompt}\n\n## {WORKSPACE_HEADING}\nYou are working in: `{}`\n\
         All relative paths are resolved against this directory.",
        workspace.display()
    )
}
