//! Workspace collaborator — open documents and workspace path resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::protocol::{self, PathToUriError};
use crate::types::Issue;

/// An editable document identified by its URI.
///
/// Contents are read-only here; the stored issues are replaced by the
/// scheduler after each completed analysis pass.
#[derive(Debug)]
pub struct ScriptFile {
    uri: String,
    contents: String,
    issues: RwLock<Vec<Issue>>,
}

impl ScriptFile {
    #[must_use]
    pub fn new(uri: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            contents: contents.into(),
            issues: RwLock::new(Vec::new()),
        }
    }

    /// Build a file from its on-disk path and current text.
    pub fn from_path(path: &Path, contents: impl Into<String>) -> Result<Self, PathToUriError> {
        let uri = protocol::path_to_file_uri(path)?;
        Ok(Self::new(uri.to_string(), contents))
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Local path, for `file:` URIs.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        protocol::file_uri_to_path(&self.uri)
    }

    #[must_use]
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Issues from the most recent completed analysis pass.
    #[must_use]
    pub fn issues(&self) -> Vec<Issue> {
        self.issues.read().clone()
    }

    pub(crate) fn set_issues(&self, issues: Vec<Issue>) {
        *self.issues.write() = issues;
    }
}

/// What the analysis subsystem needs from the workspace.
pub trait Workspace: Send + Sync {
    /// Documents currently open in the editor.
    fn open_files(&self) -> Vec<Arc<ScriptFile>>;

    /// Resolve a user-configured path to an existing file in the workspace.
    fn resolve_workspace_path(&self, configured: &str) -> Option<PathBuf>;
}

/// A workspace rooted at a local directory.
#[derive(Debug)]
pub struct LocalWorkspace {
    root: PathBuf,
    open: RwLock<HashMap<String, Arc<ScriptFile>>>,
}

impl LocalWorkspace {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Track `file` as open, replacing any previous version with the same URI.
    pub fn open(&self, file: ScriptFile) -> Arc<ScriptFile> {
        let file = Arc::new(file);
        self.open
            .write()
            .insert(file.uri().to_string(), Arc::clone(&file));
        file
    }

    pub fn close(&self, uri: &str) -> Option<Arc<ScriptFile>> {
        self.open.write().remove(uri)
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Arc<ScriptFile>> {
        self.open.read().get(uri).cloned()
    }
}

impl Workspace for LocalWorkspace {
    fn open_files(&self) -> Vec<Arc<ScriptFile>> {
        let mut files: Vec<_> = self.open.read().values().cloned().collect();
        files.sort_by(|a, b| a.uri().cmp(b.uri()));
        files
    }

    fn resolve_workspace_path(&self, configured: &str) -> Option<PathBuf> {
        // `join` keeps an absolute path as-is; both forms must land under the root.
        let candidate = self.root.join(configured).canonicalize().ok()?;
        let root = self.root.canonicalize().ok()?;
        if !candidate.starts_with(&root) {
            tracing::warn!(
                path = %candidate.display(),
                "Ignoring settings path outside the workspace"
            );
            return None;
        }
        candidate.is_file().then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_close() {
        let workspace = LocalWorkspace::new("/ws");
        workspace.open(ScriptFile::new("file:///ws/b.ps1", "b"));
        workspace.open(ScriptFile::new("file:///ws/a.ps1", "a"));

        let uris: Vec<_> = workspace
            .open_files()
            .iter()
            .map(|f| f.uri().to_string())
            .collect();
        assert_eq!(uris, vec!["file:///ws/a.ps1", "file:///ws/b.ps1"]);

        assert!(workspace.close("file:///ws/a.ps1").is_some());
        assert!(workspace.get("file:///ws/a.ps1").is_none());
        assert_eq!(workspace.open_files().len(), 1);
    }

    #[test]
    fn test_reopen_replaces_contents() {
        let workspace = LocalWorkspace::new("/ws");
        workspace.open(ScriptFile::new("file:///ws/a.ps1", "old"));
        workspace.open(ScriptFile::new("file:///ws/a.ps1", "new"));
        assert_eq!(workspace.get("file:///ws/a.ps1").unwrap().contents(), "new");
    }

    #[test]
    fn test_resolve_relative_settings_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rules.psd1"), "@{}").unwrap();
        let workspace = LocalWorkspace::new(dir.path());

        let resolved = workspace.resolve_workspace_path("rules.psd1").unwrap();
        assert!(resolved.ends_with("rules.psd1"));
        assert!(workspace.resolve_workspace_path("missing.psd1").is_none());
    }

    #[test]
    fn test_resolve_rejects_escape_from_root() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("ws");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("rules.psd1"), "@{}").unwrap();

        let workspace = LocalWorkspace::new(&root);
        assert!(workspace.resolve_workspace_path("../rules.psd1").is_none());
    }

    #[test]
    fn test_resolve_absolute_path_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.psd1");
        std::fs::write(&path, "@{}").unwrap();
        let workspace = LocalWorkspace::new(dir.path());
        assert_eq!(
            workspace.resolve_workspace_path(path.to_str().unwrap()),
            Some(path.canonicalize().unwrap())
        );
    }

    #[test]
    fn test_resolve_rejects_absolute_path_outside_root() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("ws");
        std::fs::create_dir(&root).unwrap();
        let path = outer.path().join("rules.psd1");
        std::fs::write(&path, "@{}").unwrap();

        let workspace = LocalWorkspace::new(&root);
        assert!(workspace.resolve_workspace_path(path.to_str().unwrap()).is_none());
    }

    #[test]
    fn test_set_issues_replaces() {
        let file = ScriptFile::new("file:///a.ps1", "");
        file.set_issues(vec![crate::test_support::issue(
            "RuleX",
            crate::types::SourceRange::new(1, 1, 1, 2),
            None,
        )]);
        assert_eq!(file.issues().len(), 1);
        file.set_issues(Vec::new());
        assert!(file.issues().is_empty());
    }
}
