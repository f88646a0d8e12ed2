//! Project replay driver (component E): walks a commit's file-level changes into a
//! `ProjectChange`, reparsing touched files and folding them into the live module map.
//! Grounded on `JProjectChange.edits_from_commit_history`/`_edits_from_commit_history` in
//! `code_change.py`.

pub mod git;
pub mod workspace;

pub use git::{FileChange, FileStatus, GitRepo, EMPTY_TREE};
pub use workspace::ReplayWorkspace;

use indexmap::IndexMap;
use path_absolutize::Absolutize;

use crate::change::Change;
use crate::config::ReplayConfig;
use crate::errors::{ErrorCounts, Result};
use crate::module::{module_path_from_file, CommitInfo, JModule, ModuleChange, ProjectChange};
use crate::path::ModulePath;

/// Processes one commit transition (`parent_ref` -> `commit.hash`): diffs the file tree,
/// reparses every touched source file, and folds the result into a fresh copy of the module
/// map. The repository must already be checked out at `commit.hash`.
///
/// Returns the `ProjectChange` describing what changed, plus the post-commit module map (the
/// next call's `pre_edit_modules`).
pub fn diff_commit(
    repo: &GitRepo,
    pre_edit_modules: &IndexMap<ModulePath, JModule>,
    parent_ref: &str,
    commit: &CommitInfo,
    config: &ReplayConfig,
    errors: &mut ErrorCounts,
) -> Result<(ProjectChange, IndexMap<ModulePath, JModule>)> {
    let file_changes = repo.changed_files(parent_ref, &commit.hash)?;
    let mut modules = pre_edit_modules.clone();
    let mut project_change = ProjectChange::new(commit.clone());

    for fc in file_changes {
        if !is_source_file(&fc.path) || is_ignored(&fc.path, config) {
            continue;
        }
        let mname = module_path_from_file(&fc.path);

        match fc.status {
            FileStatus::Deleted => {
                if let Some(old) = pre_edit_modules.get(&mname) {
                    project_change.insert(ModuleChange::from_modules(Change::Deleted(old.clone())));
                    modules.shift_remove(&mname);
                }
            }
            FileStatus::Added | FileStatus::Modified => {
                let abs = repo.root().join(&fc.path);
                if !path_under_root(&abs, repo.root()) {
                    errors.record_file_failure();
                    continue;
                }
                match std::fs::read_to_string(&abs) {
                    Ok(text) => {
                        let new_module = JModule::parse(mname.clone(), &text);
                        let change = match pre_edit_modules.get(&mname) {
                            Some(old) => Change::Modified(old.clone(), new_module.clone()),
                            None => Change::Added(new_module.clone()),
                        };
                        modules.insert(mname, new_module);
                        project_change.insert(ModuleChange::from_modules(change));
                    }
                    Err(_) => errors.record_file_failure(),
                }
            }
        }
    }

    Ok((project_change, modules))
}

/// Only Python sources are modeled by the scope builder; everything else is invisible to the
/// pipeline, the same restriction `code_change.py` imposes.
fn is_source_file(path: &str) -> bool {
    path.ends_with(".py")
}

fn is_ignored(path: &str, config: &ReplayConfig) -> bool {
    path.split(['/', '\\']).any(|component| config.is_ignored_component(component))
}

/// Refuses to read a path git's own diff output names if it resolves outside the checked-out
/// workspace (e.g. via a `..` segment) rather than trusting it blindly.
fn path_under_root(path: &std::path::Path, root: &std::path::Path) -> bool {
    match (path.absolutize(), root.absolutize()) {
        (Ok(path_abs), Ok(root_abs)) => path_abs.starts_with(root_abs),
        _ => false,
    }
}
