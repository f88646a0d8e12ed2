//! Line delta engine (component B): a compact, restrictable representation of the difference
//! between two line sequences, built on the same Myers-diff usage `diff.rs` makes of the
//! `similar` crate, generalized from "unified diff text" to a structured delta that supports
//! exact sub-range restriction and token-stream emission.

use similar::{Algorithm, ChangeTag, TextDiff};

/// One insertion recorded at a gap between (or around) original lines.
pub type Insertion = String;

/// A line-level delta between an `original` line sequence and some `new` sequence.
///
/// Internally a delta is anchored on *gaps* between original lines: gap `i` (for
/// `i in 0..=original_len`) holds the lines to insert immediately before original line `i`
/// (gap `original_len` holds trailing insertions, after the last original line). Each
/// original line additionally carries a `deleted` flag.
///
/// This representation slices cleanly: restricting to `[lo, hi)` is exactly
/// `anchors[lo..=hi]` + `deleted[lo..hi]`, which is what makes `for_input_range` exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDelta {
    anchors: Vec<Vec<Insertion>>,
    deleted: Vec<bool>,
}

impl LineDelta {
    /// Number of lines in the original sequence this delta was computed against.
    pub fn original_len(&self) -> usize {
        self.deleted.len()
    }

    /// Computes the delta turning `original` into `new`.
    pub fn compute(original: &[String], new: &[String]) -> Self {
        let old_refs: Vec<&str> = original.iter().map(String::as_str).collect();
        let new_refs: Vec<&str> = new.iter().map(String::as_str).collect();

        let diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .diff_slices(&old_refs, &new_refs);

        let mut anchors: Vec<Vec<Insertion>> = vec![Vec::new(); original.len() + 1];
        let mut deleted = vec![false; original.len()];
        let mut old_idx = 0usize;

        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Equal => {
                    old_idx += 1;
                }
                ChangeTag::Delete => {
                    deleted[old_idx] = true;
                    old_idx += 1;
                }
                ChangeTag::Insert => {
                    anchors[old_idx].push(change.value().to_string());
                }
            }
        }

        LineDelta { anchors, deleted }
    }

    /// Applies this delta to `original`, reproducing `new`.
    ///
    /// `original` must be the exact sequence this delta was computed against (or an equal-
    /// length slice of it, as produced by [`LineDelta::for_input_range`]).
    pub fn apply(&self, original: &[String]) -> Vec<String> {
        assert_eq!(
            original.len(),
            self.deleted.len(),
            "LineDelta::apply called with a mismatched original sequence"
        );
        let mut out = Vec::new();
        for (i, line) in original.iter().enumerate() {
            out.extend(self.anchors[i].iter().cloned());
            if !self.deleted[i] {
                out.push(line.clone());
            }
        }
        out.extend(self.anchors[self.deleted.len()].iter().cloned());
        out
    }

    /// Restricts this delta to the input range `[lo, hi)`. The returned delta's domain is
    /// exactly those `hi - lo` original lines; applying it to `original[lo..hi]` yields the
    /// sub-region of `new` corresponding to that range (including insertions anchored
    /// strictly inside the range, at its start, or at its end).
    pub fn for_input_range(&self, lo: usize, hi: usize) -> LineDelta {
        assert!(lo <= hi && hi <= self.deleted.len());
        LineDelta {
            anchors: self.anchors[lo..=hi].to_vec(),
            deleted: self.deleted[lo..hi].to_vec(),
        }
    }

    /// Whether this (sub-)delta represents any change at all.
    pub fn is_empty(&self) -> bool {
        self.deleted.iter().all(|d| !d) && self.anchors.iter().all(Vec::is_empty)
    }

    /// Convenience: applies this delta to `original` and returns the result as a single
    /// newline-joined string.
    pub fn apply_to_code(&self, original_code: &str) -> String {
        let lines = split_lines(original_code);
        self.apply(&lines).join("\n")
    }

    /// Emits this delta as a token-delta stream: one entry per original-line gap
    /// (`original_len() + 1` entries total, the last holding only trailing insertions),
    /// where each entry lists the add/delete edit tokens anchored there.
    pub fn to_tk_delta(&self) -> Vec<Vec<DeltaToken>> {
        let mut out = Vec::with_capacity(self.anchors.len());
        for i in 0..self.anchors.len() {
            let mut entry = Vec::new();
            for ins in &self.anchors[i] {
                entry.push(DeltaToken::Add(ins.clone()));
            }
            if i < self.deleted.len() && self.deleted[i] {
                entry.push(DeltaToken::Del);
            }
            out.push(entry);
        }
        out
    }
}

/// One edit operation in a token-delta stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaToken {
    Add(String),
    Del,
}

/// Splits `code` into lines the same way `str::lines` would, but without losing a final
/// empty segment caused by a trailing newline, matching how the rest of the pipeline counts
/// line ranges (an `N`-line block always yields exactly `N` entries).
pub fn split_lines(code: &str) -> Vec<String> {
    if code.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = code.split('\n').map(String::from).collect();
    if lines.last().map(String::as_str) == Some("") {
        lines.pop();
    }
    lines
}
