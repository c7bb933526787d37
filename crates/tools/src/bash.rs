//! Bash tool: run a foreground shell command in the workspace.
//!
//! The command runs with the workspace as its working directory and is
//! killed when it outlives its timeout. A non-zero exit code is reported
//! as a failure carrying the captured output.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::workspace::Workspace;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const MAX_TIMEOUT_SECS: u64 = 600;

pub struct BashTool {
    workspace: Workspace,
    default_timeout_secs: u64,
}

#[derive(Deserialize)]
struct BashArgs {
    command: String,
    timeout: Option<u64>,
}

impl BashTool {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs.clamp(1, MAX_TIMEOUT_SECS);
        self
    }

    /// Out-of-range requests fall back to the default or the ceiling.
    fn effective_timeout(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(0) | None => self.default_timeout_secs,
            Some(secs) => secs.min(MAX_TIMEOUT_SECS),
        }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("powershell.exe");
            c.args(["-NoProfile", "-Command", command]);
            c
        } else {
            let mut c = Command::new("bash");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(self.workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

fn format_output(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let mut output = stdout.to_string();
    if !stderr.is_empty() {
        output.push_str(&format!("\n[stderr]:\n{stderr}"));
    }
    if exit_code != 0 {
        output.push_str(&format!("\n[exit_code]:\n{exit_code}"));
    }
    if output.trim().is_empty() {
        output = "(no output)".into();
    }
    output
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace directory and return stdout, stderr \
         and the exit code. Default timeout is 120 seconds, maximum 600."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Timeout in seconds (default 120, max 600)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: BashArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let timeout_secs = self.effective_timeout(args.timeout);

        debug!(command = %args.command, timeout_secs, "Executing shell command");

        let child = self
            .command(&args.command)
            .spawn()
            .map_err(|e| ToolError::failed(self.name(), e))?;

        let output =
            match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
                .await
            {
                Ok(result) => result.map_err(|e| ToolError::failed(self.name(), e))?,
                Err(_) => {
                    warn!(command = %args.command, timeout_secs, "Command timed out");
                    return Err(ToolError::Timeout {
                        tool_name: self.name().into(),
                        timeout: Duration::from_secs(timeout_secs),
                    });
                }
            };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        let rendered = format_output(&stdout, &stderr, exit_code);

        if output.status.success() {
            Ok(rendered)
        } else {
            warn!(command = %args.command, exit_code, "Command failed");
            Err(ToolError::failed(
                self.name(),
                format!("command exited with code {exit_code}\n{rendered}"),
            ))
        }
    }
}
