//! Thin subprocess wrapper around the `git` binary: checkout, diff, and commit enumeration,
//! grounded on a preference for shelling out to an external tool for heavy lifting rather than
//! reimplementing it (see `protocol/smart.rs`'s pack-protocol subprocess boundary).

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};

use crate::errors::{CoeditorError, Result};
use crate::module::CommitInfo;

/// The well-known hash of git's empty tree object, used as the "parent" of a repository's
/// very first commit so it can be diffed (and therefore treated as wholly `Added`) the same
/// way every later commit is.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// How one path changed between two commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Deleted,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub status: FileStatus,
    pub path: String,
}

/// A working copy with a `git` binary available on `PATH`, rooted at `root`.
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        GitRepo { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(|e| CoeditorError::GitError(format!("spawning git {args:?}: {e}")))?;
        if !output.status.success() {
            return Err(CoeditorError::GitError(format!(
                "git {args:?} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        String::from_utf8(output.stdout).map_err(|e| CoeditorError::GitError(format!("non-UTF8 git output: {e}")))
    }

    /// Forces the working tree to exactly match `commit`, discarding any local modifications
    /// (the replay workspace is throwaway, so there is nothing to preserve).
    pub fn checkout_forced(&self, commit: &str) -> Result<()> {
        self.run(&["checkout", "-f", commit]).map(|_| ())
    }

    /// File-level changes between two commits. Renames (`R###`) are split into a delete of the
    /// old path and an add of the new one, rather than surfaced as a distinct rename kind.
    pub fn changed_files(&self, from: &str, to: &str) -> Result<Vec<FileChange>> {
        let out = self.run(&["diff", "--name-status", "-M", from, to])?;
        let mut changes = Vec::new();
        for line in out.lines() {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, '\t');
            let status = parts.next().unwrap_or("");
            let a = parts.next().unwrap_or("");
            let b = parts.next();
            match status.chars().next() {
                Some('A') => changes.push(FileChange {
                    status: FileStatus::Added,
                    path: a.to_string(),
                }),
                Some('D') => changes.push(FileChange {
                    status: FileStatus::Deleted,
                    path: a.to_string(),
                }),
                Some('M') => changes.push(FileChange {
                    status: FileStatus::Modified,
                    path: a.to_string(),
                }),
                Some('R') => {
                    changes.push(FileChange {
                        status: FileStatus::Deleted,
                        path: a.to_string(),
                    });
                    if let Some(new_path) = b {
                        changes.push(FileChange {
                            status: FileStatus::Added,
                            path: new_path.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(changes)
    }

    /// Enumerates commits newest-first, optionally capped at `max_count`.
    pub fn commit_log(&self, max_count: Option<usize>) -> Result<Vec<CommitInfo>> {
        let count_arg = max_count.map(|n| format!("-n{n}"));
        let mut args = vec!["log", "--format=%H%x1f%s%x1f%an%x1f%aI%x1e"];
        if let Some(arg) = &count_arg {
            args.push(arg);
        }
        let out = self.run(&args)?;

        let mut commits = Vec::new();
        for record in out.split('\u{1e}') {
            let record = record.trim();
            if record.is_empty() {
                continue;
            }
            let mut fields = record.splitn(4, '\u{1f}');
            let hash = fields.next().unwrap_or_default().to_string();
            let summary = fields.next().unwrap_or_default().to_string();
            let author = fields.next().filter(|s| !s.is_empty()).map(String::from);
            let timestamp = fields
                .next()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            commits.push(CommitInfo {
                hash,
                summary,
                author,
                timestamp,
            });
        }
        Ok(commits)
    }
}
