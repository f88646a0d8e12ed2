//! Error types for the replay/diff/packing pipeline.
//!
//! This module defines a unified error enumeration used across scope parsing, commit replay,
//! usage analysis, and token packing. It integrates with `thiserror` to provide rich `Display`
//! implementations and error source chaining where applicable.
//!
//! Notes:
//! - Each variant carries contextual details via its message payload.
//! - Variants cover parse/validation, git subprocess, workspace, I/O, and packing-budget errors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the replay pipeline.
///
/// Used across the scope builder, differ, replay driver, usage analyzer and token packer.
/// Implements `std::error::Error` via `thiserror`.
pub enum CoeditorError {
    /// The source text could not be decomposed into a scope tree.
    #[error("Not a valid module: {0}")]
    InvalidModule(String),

    /// A git subprocess invocation failed or returned a non-zero exit status.
    #[error("Git command failed: {0}")]
    GitError(String),

    /// The throwaway replay workspace could not be created or torn down.
    #[error("Workspace setup failed: {0}")]
    WorkspaceError(String),

    /// I/O error from the underlying filesystem or subprocess pipes.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    /// A file's bytes could not be decoded as UTF-8 text.
    #[error("Decode error for `{0}`: not valid UTF-8")]
    DecodeError(String),

    /// Configuration could not be parsed or validated.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Usage analysis failed to resolve a name; absorbed by the caller and counted, never
    /// propagated as a hard error, but it is still a `CoeditorError` value internally so it
    /// can flow through the same `Result` plumbing as everything else.
    #[error("Usage resolution error: {0}")]
    UsageError(String),

    /// The token packer produced (or was about to produce) a record outside its configured
    /// budget. This indicates a packer bug, not bad input, and should never be observed
    /// outside of `debug_assert!`-style checks.
    #[error("Packer budget violated: {0}")]
    BudgetViolation(String),

    /// Generic catch-all for conditions that don't fit the above.
    #[error("{0}")]
    CustomError(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoeditorError>;

/// Accumulated, non-fatal failure histogram surfaced alongside a replay result: per-commit
/// skips, per-file decode skips, and per-name analyzer failures bucketed by a canonical
/// category so the caller can tell "expected" misses (external module) apart from genuine
/// resolution bugs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub per_commit_failures: usize,
    pub per_file_failures: usize,
    pub per_name_failures: HashMap<String, usize>,
}

impl ErrorCounts {
    pub fn record_commit_failure(&mut self) {
        self.per_commit_failures += 1;
    }

    pub fn record_file_failure(&mut self) {
        self.per_file_failures += 1;
    }

    pub fn record_name_failure(&mut self, category: &str) {
        *self.per_name_failures.entry(category.to_string()).or_insert(0) += 1;
    }

    /// Merges another histogram's counts into this one (used to fold per-commit counters
    /// into the driver's running total).
    pub fn merge(&mut self, other: &ErrorCounts) {
        self.per_commit_failures += other.per_commit_failures;
        self.per_file_failures += other.per_file_failures;
        for (k, v) in &other.per_name_failures {
            *self.per_name_failures.entry(k.clone()).or_insert(0) += v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_all_buckets() {
        let mut a = ErrorCounts::default();
        a.record_commit_failure();
        a.record_name_failure("unresolved_name");

        let mut b = ErrorCounts::default();
        b.record_file_failure();
        b.record_name_failure("unresolved_name");

        a.merge(&b);
        assert_eq!(a.per_commit_failures, 1);
        assert_eq!(a.per_file_failures, 1);
        assert_eq!(a.per_name_failures["unresolved_name"], 2);
    }
}
