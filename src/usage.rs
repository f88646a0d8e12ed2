//! Usage analyzer (component F): resolves name occurrences on queried lines back to the
//! project-local definitions they refer to, and computes a deterministic topological module
//! order. Grounded on `PyDefinition`/`LineUsageAnalysis`/`pre_edit_analysis`/`post_edit_analysis`
//! in `ctx_change_encoder.py`.
//!
//! A full type-inference-backed resolver is out of scope; this supplies a minimal but real
//! project-local index instead: every module's exported top-level names are indexed once, and
//! `from M import name` / `import M` are resolved against that index, transitively through
//! one level of re-export.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ErrorCounts;
use crate::module::JModule;
use crate::path::ModulePath;

/// A single resolved definition. Equality and hashing cover all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PyDefinition {
    pub full_name: String,
    pub start_pos: usize,
    pub end_pos: usize,
}

impl PyDefinition {
    fn from_scope(scope: &crate::scope::ScopeTree) -> Self {
        let (start, end) = scope.full_line_range();
        PyDefinition {
            full_name: scope.path.full_name(),
            start_pos: start,
            end_pos: end,
        }
    }

    fn from_assignment(module: &ModulePath, name: &str, line_range: (usize, usize)) -> Self {
        PyDefinition {
            full_name: format!("{}.{}", module.as_dotted(), name),
            start_pos: line_range.0,
            end_pos: line_range.1,
        }
    }

    fn owning_module(&self) -> &str {
        self.full_name
            .rsplit_once('.')
            .map(|(module, _)| module)
            .unwrap_or(&self.full_name)
    }
}

/// Which absolute source lines reference which project-local definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUsageAnalysis {
    pub line_usages: HashMap<usize, HashSet<PyDefinition>>,
}

impl LineUsageAnalysis {
    pub fn usages_at(&self, line: usize) -> impl Iterator<Item = &PyDefinition> {
        self.line_usages.get(&line).into_iter().flatten()
    }
}

/// One module's exported top-level names, its one-level re-export table, and the set of
/// project-local modules it depends on (used for the topological order).
struct ModuleIndex {
    exports: HashMap<String, PyDefinition>,
    reexports: HashMap<String, (ModulePath, String)>,
    deps: HashSet<ModulePath>,
}

impl ModuleIndex {
    fn build(module: &JModule, all_modules: &HashSet<ModulePath>) -> Self {
        let mut exports = HashMap::new();
        for sub in module.scope.subscopes.values() {
            exports.insert(sub.path.inner.clone(), PyDefinition::from_scope(sub));
        }
        for span in &module.scope.spans {
            if let Some(first_line) = span.code.lines().next() {
                if let Some(name) = assigned_name(first_line) {
                    exports
                        .entry(name.clone())
                        .or_insert_with(|| PyDefinition::from_assignment(&module.mname, &name, span.line_range));
                }
            }
        }

        let mut reexports = HashMap::new();
        let mut deps = HashSet::new();
        for (bound, source_module, original) in &module.scope.import_origins {
            let source = ModulePath::from_dotted(source_module);
            if all_modules.contains(&source) {
                deps.insert(source.clone());
                reexports.insert(bound.clone(), (source, original.clone()));
            }
        }

        ModuleIndex { exports, reexports, deps }
    }
}

/// A project-wide, single-commit snapshot of every module's exported names, used to resolve
/// usages and to order modules topologically.
pub struct ProjectIndex {
    modules: HashMap<ModulePath, ModuleIndex>,
}

impl ProjectIndex {
    pub fn build(modules: &IndexMap<ModulePath, JModule>) -> Self {
        let all: HashSet<ModulePath> = modules.keys().cloned().collect();
        let indexed = modules
            .iter()
            .map(|(name, m)| (name.clone(), ModuleIndex::build(m, &all)))
            .collect();
        ProjectIndex { modules: indexed }
    }

    /// Resolves `name` as seen from inside `module`, following at most one level of
    /// re-export beyond the direct import. Returns `None` when `name` isn't a project-local
    /// definition (built-in or external-library names are simply not followed) — this is the
    /// expected common case, not an error.
    fn resolve(&self, module: &ModulePath, name: &str) -> Option<PyDefinition> {
        let idx = self.modules.get(module)?;
        if let Some(def) = idx.exports.get(name) {
            return Some(def.clone());
        }
        let (source, original) = idx.reexports.get(name)?;
        let source_idx = self.modules.get(source)?;
        if let Some(def) = source_idx.exports.get(original) {
            return Some(def.clone());
        }
        let (source2, original2) = source_idx.reexports.get(original)?;
        self.modules.get(source2)?.exports.get(original2).cloned()
    }

    /// A deterministic linear order over the modules in `modules`, consistent with the
    /// project-local import graph: if `N` imports a definition from `M`, `M` precedes `N`
    /// unless they are part of an import cycle.
    ///
    /// Implemented as a DFS-based topological sort, visiting modules in lexicographic order
    /// to break ties deterministically; a back-edge into a module still `in_progress` on the
    /// current DFS stack is dropped rather than followed, which is what breaks cycles
    /// "first-seen-wins" — whichever module's traversal reached the cycle first keeps its
    /// dependency resolved, the other does not.
    pub fn topological_order(&self, modules: &IndexMap<ModulePath, JModule>) -> Vec<ModulePath> {
        let mut names: Vec<ModulePath> = modules.keys().cloned().collect();
        names.sort();

        let mut visited: HashSet<ModulePath> = HashSet::new();
        let mut in_progress: HashSet<ModulePath> = HashSet::new();
        let mut order: Vec<ModulePath> = Vec::new();

        for name in &names {
            visit(name, &self.modules, &mut visited, &mut in_progress, &mut order);
        }
        order
    }
}

fn visit(
    m: &ModulePath,
    modules: &HashMap<ModulePath, ModuleIndex>,
    visited: &mut HashSet<ModulePath>,
    in_progress: &mut HashSet<ModulePath>,
    order: &mut Vec<ModulePath>,
) {
    if visited.contains(m) || in_progress.contains(m) {
        return;
    }
    in_progress.insert(m.clone());
    if let Some(idx) = modules.get(m) {
        let mut deps: Vec<&ModulePath> = idx.deps.iter().collect();
        deps.sort();
        for dep in deps {
            visit(dep, modules, visited, in_progress, order);
        }
    }
    in_progress.remove(m);
    visited.insert(m.clone());
    order.push(m.clone());
}

/// Resolves every name occurrence on `lines` (absolute, 0-based line numbers within
/// `module`) to the project-local definitions it refers to. Occurrences that look like
/// attribute access through an imported module (`mod.attr`) are outside what a one-level
/// project-local resolver can follow; they are bucketed into `errors` instead of silently
/// dropped so the caller can see how much of the usage picture is missing.
pub fn analyze_usages(
    module: &JModule,
    project: &ProjectIndex,
    lines: &HashSet<usize>,
    errors: &mut ErrorCounts,
) -> LineUsageAnalysis {
    let source_lines = module.source_lines();
    let mut candidates: Vec<String> = module.scope.imported_names.clone();
    if let Some(idx) = project.modules.get(&module.mname) {
        candidates.extend(idx.exports.keys().cloned());
    }
    candidates.sort();
    candidates.dedup();

    let mut result = LineUsageAnalysis::default();
    for &line_no in lines {
        let Some(text) = source_lines.get(line_no) else {
            continue;
        };
        for name in &candidates {
            let Some(followed_by_dot) = occurrence(text, name) else {
                continue;
            };
            if followed_by_dot {
                errors.record_name_failure("attribute_access_unsupported");
                continue;
            }
            let Some(def) = project.resolve(&module.mname, name) else {
                continue;
            };
            if is_self_reference(&def, &module.mname, lines) {
                continue;
            }
            result.line_usages.entry(line_no).or_default().insert(def);
        }
    }
    result
}

fn is_self_reference(def: &PyDefinition, module: &ModulePath, lines: &HashSet<usize>) -> bool {
    if def.owning_module() != module.as_dotted() {
        return false;
    }
    (def.start_pos..def.end_pos).any(|l| lines.contains(&l))
}

/// Extracts `name = ...` / `name: Type = ...` at module top level; `None` for anything else
/// (including `==`, augmented assignment, or a non-identifier left-hand side).
fn assigned_name(first_line: &str) -> Option<String> {
    let trimmed = first_line.trim();
    let (lhs, rhs) = trimmed.split_once('=')?;
    if rhs.starts_with('=') || lhs.ends_with(['!', '<', '>', '+', '-', '*', '/', '%', '&', '|', '^']) {
        return None;
    }
    let name = lhs.split(':').next().unwrap_or(lhs).trim();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(name.to_string())
    } else {
        None
    }
}

/// Whether `name` occurs in `text` as a whole identifier (not a substring of a longer one),
/// and if so, whether it's immediately followed by `.` (an attribute access this resolver
/// does not follow).
fn occurrence(text: &str, name: &str) -> Option<bool> {
    if name.is_empty() {
        return None;
    }
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(rel) = text[start..].find(name) {
        let abs = start + rel;
        let before_ok = abs == 0 || !is_ident_char(bytes[abs - 1] as char);
        let after = abs + name.len();
        let after_ok = after >= bytes.len() || !is_ident_char(bytes[after] as char);
        if before_ok && after_ok {
            let followed_by_dot = after < bytes.len() && bytes[after] as char == '.';
            return Some(followed_by_dot);
        }
        start = abs + 1;
        if start >= text.len() {
            break;
        }
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
