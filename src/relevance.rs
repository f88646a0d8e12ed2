//! Relevance selector (component G): for one edited `ChangedSpan`, picks the unchanged
//! definitions worth showing as context and orders the previously-seen changes worth
//! repeating. Grounded on `get_relevant_unchanged`/`get_def_spans` in `ctx_change_encoder.py`.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::differ::ChangedSpan;
use crate::module::JModule;
use crate::path::{ModulePath, ProjectPath};
use crate::scope::{ScopeKind, ScopeTree};
use crate::usage::{LineUsageAnalysis, PyDefinition};

/// An unchanging fragment of code offered as context alongside an edit: either a whole
/// function body, a class's own attribute span, or a top-level statement span, with a count
/// of how many enclosing scope bodies were elided to reach it (the class/module signature
/// the reader would otherwise see but that isn't repeated in full).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantFragment {
    pub module: ModulePath,
    pub path: ProjectPath,
    pub line_range: (usize, usize),
    pub code: String,
    pub elided_ancestors: usize,
}

/// The context offered alongside one `ChangedSpan`: previously-seen changes (latest first)
/// and unchanged definitions referenced by or enclosing the edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceResult {
    pub relevant_changes: Vec<ChangedSpan>,
    pub relevant_unchanged: Vec<RelevantFragment>,
}

/// Selects the relevance context for `span`, whose enclosing module is `pre_edit_modules`
/// (the snapshot *before* the commit — unchanged definitions are always drawn from there).
/// `usages` is the pre-edit line-usage analysis for `span`'s own module. `processed` is every
/// `ChangedSpan` emitted so far this commit, oldest first.
pub fn select_relevant(
    span: &ChangedSpan,
    pre_edit_modules: &IndexMap<ModulePath, JModule>,
    usages: &LineUsageAnalysis,
    processed: &[ChangedSpan],
) -> RelevanceResult {
    let mut seen: HashSet<PyDefinition> = HashSet::new();
    let mut sorted_defs: Vec<PyDefinition> = Vec::new();

    // 1. Parent definitions of the edit, innermost first, excluding the module root (no
    // fragment to show) and excluding the function directly being edited (its body *is* the
    // span itself — a function never recurses into subscopes, so there is nothing left to
    // elide between "the function" and "the span").
    let chain = &span.parent_scopes;
    let last_idx = chain.len().saturating_sub(1);
    for (i, parent) in chain.iter().enumerate().rev() {
        let header = parent.later();
        if header.kind == ScopeKind::Module {
            continue;
        }
        if header.kind == ScopeKind::Function && i == last_idx {
            continue;
        }
        let def = PyDefinition {
            full_name: header.path.full_name(),
            start_pos: header.header_line_range.0,
            end_pos: header.header_line_range.1,
        };
        if seen.insert(def.clone()) {
            sorted_defs.push(def);
        }
    }

    // 2. Every name used on a line this edit touches (its own lines plus its header lines),
    // deterministically tie-broken by (start_pos, full_name).
    let mut touched_lines: Vec<usize> = (span.line_range.0..span.line_range.1)
        .chain(span.header_line_range().0..span.header_line_range().1)
        .collect();
    touched_lines.sort_unstable();
    touched_lines.dedup();

    let mut used_defs: Vec<PyDefinition> = Vec::new();
    for line in touched_lines {
        for def in usages.usages_at(line) {
            if seen.insert(def.clone()) {
                used_defs.push(def.clone());
            }
        }
    }
    used_defs.sort_by(|a, b| a.start_pos.cmp(&b.start_pos).then_with(|| a.full_name.cmp(&b.full_name)));
    sorted_defs.extend(used_defs);

    // 3. Resolve every collected definition to its unchanged fragment(s), dedup by
    // (module, line_range), and drop anything that coincides with the span itself or with a
    // change already listed in `relevant_changes`.
    let mut fragments: Vec<RelevantFragment> = Vec::new();
    let mut fragment_keys: HashSet<(ModulePath, (usize, usize))> = HashSet::new();
    let own_key = (span.path().module, span.line_range);

    for def in &sorted_defs {
        for fragment in resolve_fragments(pre_edit_modules, def) {
            let key = (fragment.module.clone(), fragment.line_range);
            if key == own_key {
                continue;
            }
            if processed
                .iter()
                .any(|cs| cs.path().module == fragment.module && cs.line_range == fragment.line_range)
            {
                continue;
            }
            if fragment_keys.insert(key) {
                fragments.push(fragment);
            }
        }
    }

    RelevanceResult {
        relevant_changes: processed.iter().rev().cloned().collect(),
        relevant_unchanged: fragments,
    }
}

/// Resolves one `PyDefinition` to the unchanged fragment(s) that represent it in the
/// pre-edit snapshot.
fn resolve_fragments(modules: &IndexMap<ModulePath, JModule>, def: &PyDefinition) -> Vec<RelevantFragment> {
    let Some((module, inner)) = owning_module(modules, &def.full_name) else {
        return Vec::new();
    };

    if inner.is_empty() {
        return Vec::new();
    }

    match find_scope(module, &inner) {
        Some(scope) => {
            let elided = inner.matches('.').count();
            match scope.kind {
                ScopeKind::Function => scope
                    .spans
                    .last()
                    .map(|body| {
                        vec![RelevantFragment {
                            module: module.mname.clone(),
                            path: scope.path.clone(),
                            line_range: body.line_range,
                            code: body.code.clone(),
                            elided_ancestors: elided,
                        }]
                    })
                    .unwrap_or_default(),
                ScopeKind::Class => {
                    let mut out: Vec<RelevantFragment> = scope
                        .spans
                        .iter()
                        .map(|s| RelevantFragment {
                            module: module.mname.clone(),
                            path: scope.path.clone(),
                            line_range: s.line_range,
                            code: s.code.clone(),
                            elided_ancestors: elided,
                        })
                        .collect();
                    for sub in scope.subscopes.values() {
                        if sub.kind == ScopeKind::Function {
                            if let Some(body) = sub.spans.last() {
                                out.push(RelevantFragment {
                                    module: module.mname.clone(),
                                    path: sub.path.clone(),
                                    line_range: body.line_range,
                                    code: body.code.clone(),
                                    elided_ancestors: elided,
                                });
                            }
                        }
                    }
                    out
                }
                ScopeKind::Module => Vec::new(),
            }
        }
        // Not a subscope: a module-level assignment, represented by its own statement span.
        None => module
            .scope
            .spans
            .iter()
            .find(|s| s.line_range == (def.start_pos, def.end_pos))
            .map(|s| {
                vec![RelevantFragment {
                    module: module.mname.clone(),
                    path: ProjectPath::module_root(module.mname.clone()),
                    line_range: s.line_range,
                    code: s.code.clone(),
                    elided_ancestors: 0,
                }]
            })
            .unwrap_or_default(),
    }
}

/// Finds the module owning `full_name` by trying decreasing dotted prefixes (module names
/// may themselves contain dots), and returns the remaining dotted path inside that module.
fn owning_module<'a>(modules: &'a IndexMap<ModulePath, JModule>, full_name: &str) -> Option<(&'a JModule, String)> {
    let parts: Vec<&str> = full_name.split('.').collect();
    for i in (1..=parts.len()).rev() {
        let candidate = ModulePath::new(parts[..i].iter().copied());
        if let Some(module) = modules.get(&candidate) {
            return Some((module, parts[i..].join(".")));
        }
    }
    None
}

/// Walks `module`'s scope tree by dotted inner path, the same way each child path was built
/// (`parent_path.append(segment)`), returning the matching subscope if any.
fn find_scope<'a>(module: &'a JModule, inner: &str) -> Option<&'a ScopeTree> {
    let mut current = &module.scope;
    let mut path = ProjectPath::module_root(module.mname.clone());
    for seg in inner.split('.') {
        path = path.append(seg);
        current = current.subscopes.get(&path)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;
    use crate::differ::diff_module;

    fn modules(sources: &[(&str, &str)]) -> IndexMap<ModulePath, JModule> {
        let mut map = IndexMap::new();
        for (name, src) in sources {
            let mname = ModulePath::from_dotted(name);
            map.insert(mname.clone(), JModule::parse(mname, src));
        }
        map
    }

    #[test]
    fn cross_module_usage_surfaces_callee_fragment() {
        let pre = modules(&[
            ("a", "def g():\n    return 1\n"),
            ("b", "from a import g\n\ndef f():\n    return g()\n"),
        ]);
        let post_b = JModule::parse(
            ModulePath::from_dotted("b"),
            "from a import g\n\ndef f():\n    return g() + 1\n",
        );
        let spans = diff_module(Change::Modified(
            pre[&ModulePath::from_dotted("b")].scope.clone(),
            post_b.scope.clone(),
        ));
        assert_eq!(spans.len(), 1);
        let span = &spans[0];

        let index = crate::usage::ProjectIndex::build(&pre);
        let mut errors = crate::errors::ErrorCounts::default();
        let lines: HashSet<usize> = (span.line_range.0..span.line_range.1).collect();
        let usages = crate::usage::analyze_usages(&pre[&ModulePath::from_dotted("b")], &index, &lines, &mut errors);

        let result = select_relevant(span, &pre, &usages, &[]);
        assert_eq!(result.relevant_unchanged.len(), 1);
        assert_eq!(result.relevant_unchanged[0].path.full_name(), "a.g");
        assert!(result.relevant_changes.is_empty());
    }

    #[test]
    fn relevant_changes_are_latest_first() {
        let pre = modules(&[("m", "def f():\n    pass\n\ndef g():\n    pass\n")]);
        let post = JModule::parse(
            ModulePath::from_dotted("m"),
            "def f():\n    return 1\n\ndef g():\n    return 2\n",
        );
        let spans = diff_module(Change::Modified(
            pre[&ModulePath::from_dotted("m")].scope.clone(),
            post.scope.clone(),
        ));
        assert_eq!(spans.len(), 2);

        let usages = LineUsageAnalysis::default();
        let processed = vec![spans[0].clone()];
        let result = select_relevant(&spans[1], &pre, &usages, &processed);
        assert_eq!(result.relevant_changes, vec![spans[0].clone()]);
    }

    #[test]
    fn class_method_ancestor_is_seeded_as_unchanged_context() {
        let pre = modules(&[(
            "m",
            "class C:\n    attr = 1\n\n    def m(self):\n        return 1\n",
        )]);
        let post_method_body = "    def m(self):\n        return 2";
        let old_class = pre[&ModulePath::from_dotted("m")].scope.subscopes.values().next().unwrap();
        let old_method = old_class.subscopes.values().next().unwrap();
        let new_method_code = post_method_body.to_string();
        let span = ChangedSpan {
            change: crate::change::Change::Modified(old_method.spans[0].code.clone(), new_method_code),
            parent_scopes: vec![
                crate::change::Change::from_unchanged(pre[&ModulePath::from_dotted("m")].scope.header()),
                crate::change::Change::from_unchanged(old_class.header()),
                crate::change::Change::from_unchanged(old_method.header()),
            ],
            line_range: old_method.spans[0].line_range,
        };

        let usages = LineUsageAnalysis::default();
        let result = select_relevant(&span, &pre, &usages, &[]);
        // The class ancestor is seeded; the function-itself ancestor is excluded since it's
        // what the span already represents.
        assert!(result.relevant_unchanged.iter().all(|f| f.path.full_name() != "m.C.m"));
    }
}
