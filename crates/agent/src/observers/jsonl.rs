//! JSONL event recorder: one JSON object per line, one file per run.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use stepwise_core::event::{AgentEvent, Observer};
use tracing::{info, warn};

/// Appends every event as one JSON line to a run log file.
///
/// Write failures are logged and dropped.
pub struct JsonlRecorder {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlRecorder {
    /// Open (or create) `path` for appending, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Recording run events");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// A new `agent_run_<timestamp>.jsonl` file inside `dir`.
    pub fn timestamped(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let name = format!("agent_run_{}.jsonl", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        Self::create(dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Observer for JsonlRecorder {
    fn on_event(&self, event: &AgentEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize event for run log");
                return;
            }
        };

        let Ok(mut file) = self.file.lock() else {
            warn!(path = %self.path.display(), "Run log lock poisoned; event dropped");
            return;
        };
        if let Err(e) = writeln!(file, "{line}").and_then(|_| file.flush()) {
            warn!(path = %self.path.display(), error = %e, "Failed to write run log");
        }
    }
}
