//! Throwaway replay workspace: a temporary clone of the target repository so replay never
//! touches the caller's working tree. Grounded on the same `tempfile` usage `diff.rs`'s tests
//! make for disposable filesystem state.

use std::path::Path;

use tempfile::TempDir;

use crate::errors::{CoeditorError, Result};

use super::git::GitRepo;

/// A `git clone` of the target repository inside a `tempfile::TempDir`. Dropping this value
/// removes the clone from disk unconditionally, with no explicit teardown code needed on the
/// caller's part.
pub struct ReplayWorkspace {
    dir: TempDir,
    repo: GitRepo,
}

impl ReplayWorkspace {
    /// Clones `source_repo` into a fresh temporary directory.
    pub fn clone_from(source_repo: &Path) -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| CoeditorError::WorkspaceError(e.to_string()))?;

        let status = std::process::Command::new("git")
            .args(["clone", "--quiet"])
            .arg(source_repo)
            .arg(dir.path())
            .status()
            .map_err(|e| CoeditorError::WorkspaceError(format!("spawning git clone: {e}")))?;
        if !status.success() {
            return Err(CoeditorError::WorkspaceError(format!(
                "git clone exited with {status}"
            )));
        }

        let repo = GitRepo::open(dir.path());
        Ok(ReplayWorkspace { dir, repo })
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
