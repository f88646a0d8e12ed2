//! Replay and packing configuration.
//!
//! Mirrors the `PackConfig`/`LfsConfig` pattern seen throughout this codebase: a plain,
//! serde-derived struct with a hand-written `Default` impl documenting every knob, loadable
//! from a TOML file.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{CoeditorError, Result};

/// Every tunable knob exposed by the replay/packing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    /// Per-reference-chunk token cap.
    pub max_ref_tks: usize,
    /// Per-query token cap, including the scope header.
    pub max_query_tks: usize,
    /// Per-output token cap.
    pub max_output_tks: usize,
    /// Scope header token cap.
    pub max_scope_tks: usize,
    /// Lines per query chunk.
    pub max_lines_to_edit: usize,
    /// Overlap, in tokens, between consecutive reference chunks.
    pub ref_chunk_overlap: usize,
    /// Hard ceiling on the total size of all references attached to one record.
    pub max_total_ref_tks: usize,
    /// Maximum number of packed records emitted per `C3Problem`.
    pub max_chunks_per_elem: usize,
    /// Whether to skip emitting `TkC3Problem`s whose output carries no edits.
    pub skip_unchanged_problems: bool,
    /// Directory names ignored everywhere during replay (not full paths — matched by
    /// component, the same way `.git` is ignored regardless of depth).
    pub ignore_dirs: HashSet<String>,
    /// Seconds budgeted for parsing and analyzing a single commit before it is abandoned.
    pub time_limit_per_commit: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_ref_tks: 512,
            max_query_tks: 512,
            max_output_tks: 256,
            max_scope_tks: 128,
            max_lines_to_edit: 20,
            ref_chunk_overlap: 32,
            max_total_ref_tks: 512 * 64,
            max_chunks_per_elem: 4,
            skip_unchanged_problems: true,
            ignore_dirs: [".venv", ".mypy_cache", ".git", "venv", "build"]
                .into_iter()
                .map(String::from)
                .collect(),
            time_limit_per_commit: 10.0,
        }
    }
}

impl ReplayConfig {
    /// Loads configuration from a TOML file, falling back to `Default` for any field the
    /// file omits (`#[serde(default)]` on the struct covers per-field omission).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CoeditorError::ConfigError(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CoeditorError::ConfigError(e.to_string()))
    }

    pub fn is_ignored_component(&self, component: &str) -> bool {
        self.ignore_dirs.contains(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_as_documented() {
        let cfg = ReplayConfig::default();
        assert_eq!(cfg.max_ref_tks, 512);
        assert_eq!(cfg.max_query_tks, 512);
        assert_eq!(cfg.max_output_tks, 256);
        assert_eq!(cfg.max_scope_tks, 128);
        assert_eq!(cfg.max_lines_to_edit, 20);
        assert_eq!(cfg.ref_chunk_overlap, 32);
        assert_eq!(cfg.max_total_ref_tks, 32768);
        assert_eq!(cfg.max_chunks_per_elem, 4);
        assert!(cfg.skip_unchanged_problems);
        assert!(cfg.is_ignored_component(".git"));
        assert_eq!(cfg.time_limit_per_commit, 10.0);
    }

    #[test]
    fn toml_roundtrip_preserves_overrides() {
        let cfg = ReplayConfig {
            max_lines_to_edit: 5,
            ..Default::default()
        };
        let text = cfg.to_toml_string().unwrap();
        let parsed = ReplayConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_toml_fills_remaining_defaults() {
        let parsed = ReplayConfig::from_toml_str("max_output_tks = 64\n").unwrap();
        assert_eq!(parsed.max_output_tks, 64);
        assert_eq!(parsed.max_query_tks, ReplayConfig::default().max_query_tks);
    }
}
