//! Module-change differ (component D): turns a `Change<ScopeTree>` (one module's scope tree
//! before/after a commit) into the flat, sorted list of `ChangedSpan`s that actually changed,
//! recursing into subscopes the same way `get_changed_spans`/`get_modified_spans` do in
//! `code_change.py`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::delta::{split_lines, LineDelta};
use crate::path::ProjectPath;
use crate::scope::{ScopeHeader, ScopeKind, ScopeTree};

/// One changed unit of code together with the chain of scopes that contain it, from the
/// module down to its immediate (innermost) parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedSpan {
    pub change: Change<String>,
    pub parent_scopes: Vec<Change<ScopeHeader>>,
    pub line_range: (usize, usize),
}

impl ChangedSpan {
    fn innermost(&self) -> &ScopeHeader {
        self.parent_scopes
            .last()
            .expect("a ChangedSpan always has at least its own containing scope")
            .later()
    }

    pub fn path(&self) -> ProjectPath {
        self.innermost().path.clone()
    }

    pub fn header_line_range(&self) -> (usize, usize) {
        self.innermost().header_line_range
    }

    pub fn is_func_body(&self) -> bool {
        self.innermost().kind == ScopeKind::Function
    }
}

/// Computes every `ChangedSpan` between the before/after scope trees of one module, sorted by
/// the start of their line range (ties broken by `path` — see the tie-break rule recorded in
/// `DESIGN.md`).
pub fn diff_module(change: Change<ScopeTree>) -> Vec<ChangedSpan> {
    let mut out = get_changed_spans(change, &[]);
    out.sort_by(|a, b| {
        a.line_range
            .0
            .cmp(&b.line_range.0)
            .then_with(|| a.path().full_name().cmp(&b.path().full_name()))
    });
    out
}

fn get_changed_spans(change: Change<ScopeTree>, parent_scopes: &[Change<ScopeHeader>]) -> Vec<ChangedSpan> {
    match change {
        Change::Modified(old_scope, new_scope) => {
            let own_chain: Vec<Change<ScopeHeader>> = parent_scopes
                .iter()
                .cloned()
                .chain(std::iter::once(Change::Modified(
                    old_scope.header(),
                    new_scope.header(),
                )))
                .collect();

            let mut out = Vec::new();
            if old_scope.spans_code() != new_scope.spans_code() {
                out.extend(get_modified_spans(&old_scope, &new_scope, &own_chain));
            }

            let mut seen: HashSet<&ProjectPath> = HashSet::new();
            for (path, old_sub) in &old_scope.subscopes {
                seen.insert(path);
                let sub_change = match new_scope.subscopes.get(path) {
                    Some(new_sub) => Change::Modified(old_sub.clone(), new_sub.clone()),
                    None => Change::Deleted(old_sub.clone()),
                };
                out.extend(get_changed_spans(sub_change, &own_chain));
            }
            for (path, new_sub) in &new_scope.subscopes {
                if !seen.contains(path) {
                    out.extend(get_changed_spans(Change::Added(new_sub.clone()), &own_chain));
                }
            }
            out
        }
        Change::Added(scope) => {
            let own_chain: Vec<Change<ScopeHeader>> = parent_scopes
                .iter()
                .cloned()
                .chain(std::iter::once(Change::Added(scope.header())))
                .collect();
            whole_scope_spans(&scope, &own_chain, true)
        }
        Change::Deleted(scope) => {
            let own_chain: Vec<Change<ScopeHeader>> = parent_scopes
                .iter()
                .cloned()
                .chain(std::iter::once(Change::Deleted(scope.header())))
                .collect();
            whole_scope_spans(&scope, &own_chain, false)
        }
    }
}

/// Emits one `ChangedSpan` per directly-owned span of a wholly added/deleted scope, then
/// recurses into its subscopes (also wholly added/deleted).
fn whole_scope_spans(scope: &ScopeTree, own_chain: &[Change<ScopeHeader>], added: bool) -> Vec<ChangedSpan> {
    let mut out = Vec::new();
    for span in &scope.spans {
        let change = if added {
            Change::Added(span.code.clone())
        } else {
            Change::Deleted(span.code.clone())
        };
        out.push(ChangedSpan {
            change,
            parent_scopes: own_chain.to_vec(),
            line_range: span.line_range,
        });
    }
    for sub in scope.subscopes.values() {
        let sub_change = if added {
            Change::Added(sub.clone())
        } else {
            Change::Deleted(sub.clone())
        };
        out.extend(get_changed_spans(sub_change, own_chain));
    }
    out
}

/// Diffs a scope's own `spans_code` (its directly-owned statement spans, concatenated,
/// excluding any subscope body) and maps the result back onto each individual span, emitting
/// a `ChangedSpan` only for spans whose own sub-range of the delta is non-empty.
fn get_modified_spans(
    old_scope: &ScopeTree,
    new_scope: &ScopeTree,
    parent_scopes: &[Change<ScopeHeader>],
) -> Vec<ChangedSpan> {
    if old_scope.spans.is_empty() || new_scope.spans.is_empty() {
        return Vec::new();
    }

    let old_lines = split_lines(&old_scope.spans_code());
    let new_lines = split_lines(&new_scope.spans_code());
    let delta = LineDelta::compute(&old_lines, &new_lines);

    let mut out = Vec::new();
    let mut local_line = 0usize;
    for span in &old_scope.spans {
        let n_lines = split_lines(&span.code).len();
        let sub = delta.for_input_range(local_line, local_line + n_lines);
        if !sub.is_empty() {
            let new_code = sub.apply(&old_lines[local_line..local_line + n_lines]).join("\n");
            out.push(ChangedSpan {
                change: Change::Modified(span.code.clone(), new_code),
                parent_scopes: parent_scopes.to_vec(),
                line_range: span.line_range,
            });
        }
        local_line += n_lines;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ModulePath;

    fn module(source: &str) -> ScopeTree {
        ScopeTree::build_module(ProjectPath::module_root(ModulePath::from_dotted("m")), source)
    }

    #[test]
    fn single_function_body_edit_produces_one_changed_span() {
        let old = module("def f(x):\n    return x\n");
        let new = module("def f(x):\n    return x + 1\n");
        let spans = diff_module(Change::Modified(old, new));
        assert_eq!(spans.len(), 1);
        assert!(spans[0].is_func_body());
        assert_eq!(spans[0].path().full_name(), "m.f");
        match &spans[0].change {
            Change::Modified(before, after) => {
                assert!(before.contains("return x"));
                assert!(after.contains("return x + 1"));
            }
            other => panic!("expected Modified, got {other:?}"),
        }
    }

    #[test]
    fn unrelated_function_produces_no_changed_span() {
        let old = module("def f(x):\n    return x\n\ndef g():\n    pass\n");
        let new = module("def f(x):\n    return x\n\ndef g():\n    pass\n");
        let spans = diff_module(Change::Modified(old, new));
        assert!(spans.is_empty());
    }

    #[test]
    fn added_function_produces_one_added_span() {
        let old = module("def f():\n    pass\n");
        let new = module("def f():\n    pass\n\ndef g():\n    return 1\n");
        let spans = diff_module(Change::Modified(old, new));
        assert_eq!(spans.len(), 1);
        assert!(spans[0].change.is_added());
        assert_eq!(spans[0].path().full_name(), "m.g");
    }

    #[test]
    fn deleted_function_produces_one_deleted_span() {
        let old = module("def f():\n    pass\n\ndef g():\n    return 1\n");
        let new = module("def f():\n    pass\n");
        let spans = diff_module(Change::Modified(old, new));
        assert_eq!(spans.len(), 1);
        assert!(spans[0].change.is_deleted());
        assert_eq!(spans[0].path().full_name(), "m.g");
    }

    #[test]
    fn module_level_statement_edit_reports_module_as_parent() {
        let old = module("x = 1\n");
        let new = module("x = 2\n");
        let spans = diff_module(Change::Modified(old, new));
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].is_func_body());
        assert_eq!(spans[0].path().full_name(), "m");
    }

    #[test]
    fn spans_are_sorted_by_line_range_start() {
        let old = module("def a():\n    pass\n\ndef b():\n    pass\n");
        let new = module("def a():\n    return 1\n\ndef b():\n    return 2\n");
        let spans = diff_module(Change::Modified(old, new));
        assert_eq!(spans.len(), 2);
        assert!(spans[0].line_range.0 < spans[1].line_range.0);
    }
}
