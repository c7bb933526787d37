//! Workspace-relative path resolution shared by the file tools.

use std::path::{Path, PathBuf};

/// The directory tools treat as their working root.
///
/// Relative paths resolve against the root; absolute paths are used as given.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_root() {
        let ws = Workspace::new("/srv/project");
        assert_eq!(ws.resolve("src/main.rs"), PathBuf::from("/srv/project/src/main.rs"));
    }

    #[test]
    fn absolute_paths_pass_through() {
        let ws = Workspace::new("/srv/project");
        assert_eq!(ws.resolve("/tmp/notes.txt"), PathBuf::from("/tmp/notes.txt"));
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let ws = Workspace::new("work");
        assert!(ws.root().is_absolute());
        assert!(ws.root().ends_with("work"));
    }
}
