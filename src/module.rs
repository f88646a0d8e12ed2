//! Module-level containers: a parsed module, the change between two versions of it, and the
//! per-commit collection of module changes that make up one project change (component D/E
//! data model, grounded on `JModule`/`JModuleChange`/`JProjectChange` in `code_change.py`).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::differ::{diff_module, ChangedSpan};
use crate::path::{ModulePath, ProjectPath};
use crate::scope::ScopeTree;

/// One parsed module: its dotted name, the scope tree built from its source text, and the
/// raw source itself (kept around for the usage analyzer's line-text lookups — the scope
/// tree only retains text for span/header ranges, not a contiguous addressable line array).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JModule {
    pub mname: ModulePath,
    pub scope: ScopeTree,
    pub source: String,
}

impl JModule {
    pub fn parse(mname: ModulePath, source: &str) -> Self {
        let path = ProjectPath::module_root(mname.clone());
        JModule {
            mname,
            scope: ScopeTree::build_module(path, source),
            source: source.to_string(),
        }
    }

    pub fn imported_names(&self) -> &[String] {
        &self.scope.imported_names
    }

    pub fn source_lines(&self) -> Vec<String> {
        crate::delta::split_lines(&self.source)
    }
}

/// The change to one module across a commit, plus the flattened, diffed spans it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleChange {
    pub module_change: Change<JModule>,
    pub changed: Vec<ChangedSpan>,
}

impl ModuleChange {
    pub fn from_modules(module_change: Change<JModule>) -> Self {
        let scope_change = module_change.map(|m| m.scope.clone());
        let changed = diff_module(scope_change);
        ModuleChange {
            module_change,
            changed,
        }
    }

    pub fn mname(&self) -> &ModulePath {
        &self.module_change.later().mname
    }
}

/// Commit metadata a `ProjectChange` is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub summary: String,
    pub author: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// All module changes introduced by one commit, keyed by module name in the order the
/// modules were encountered in that commit's file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChange {
    pub changed: IndexMap<ModulePath, ModuleChange>,
    pub commit_info: CommitInfo,
}

impl ProjectChange {
    pub fn new(commit_info: CommitInfo) -> Self {
        ProjectChange {
            changed: IndexMap::new(),
            commit_info,
        }
    }

    pub fn insert(&mut self, change: ModuleChange) {
        self.changed.insert(change.mname().clone(), change);
    }

    pub fn all_changed_spans(&self) -> impl Iterator<Item = (&ModulePath, &ChangedSpan)> {
        self.changed
            .iter()
            .flat_map(|(name, mc)| mc.changed.iter().map(move |cs| (name, cs)))
    }
}

/// Derives a module's dotted path from a project-relative file path, stripping a trailing
/// extension and treating path separators as module separators (`pkg/sub/mod.py` ->
/// `pkg.sub.mod`), the same convention the original tool used for Python packages.
pub fn module_path_from_file(rel_path: &str) -> ModulePath {
    let without_ext = match rel_path.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => rel_path,
    };
    let segments: Vec<String> = without_ext
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    ModulePath::new(segments)
}
