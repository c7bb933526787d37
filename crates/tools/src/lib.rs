//! Built-in tool implementations for Stepwise.
//!
//! Tools give the agent hands inside its workspace: read, write and edit
//! files, and run shell commands. Every tool resolves relative paths
//! against the same [`Workspace`].

pub mod bash;
pub mod edit_file;
pub mod read_file;
pub mod workspace;
pub mod write_file;

use std::path::Path;
use stepwise_config::ToolsConfig;
use stepwise_core::tool::ToolRegistry;

pub use bash::BashTool;
pub use edit_file::EditFileTool;
pub use read_file::ReadFileTool;
pub use workspace::Workspace;
pub use write_file::WriteFileTool;

/// Create a tool registry with the built-in tools enabled by `config`.
pub fn default_registry(workspace_dir: &Path, config: &ToolsConfig) -> ToolRegistry {
    let workspace = Workspace::new(workspace_dir);
    let mut registry = ToolRegistry::new();

    if config.enable_file_tools {
        registry.register(Box::new(ReadFileTool::new(workspace.clone())));
        registry.register(Box::new(WriteFileTool::new(workspace.clone())));
        registry.register(Box::new(EditFileTool::new(workspace.clone())));
    }
    if config.enable_bash {
        registry.register(Box::new(
            BashTool::new(workspace).with_default_timeout(config.bash_timeout_secs),
        ));
    }

    tracing::debug!(tools = ?registry.names(), "Built-in tools registered");
    registry
}
