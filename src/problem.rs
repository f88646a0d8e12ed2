//! Problem generator (component H): walks a commit's modules in topological order and turns
//! each gated `ChangedSpan` into a `C3Problem` carrying its relevance context. Grounded on
//! `C3ProblemGenerator.process_change` in `ctx_change_encoder.py`.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::differ::ChangedSpan;
use crate::errors::ErrorCounts;
use crate::module::{JModule, ProjectChange};
use crate::path::ModulePath;
use crate::relevance::{select_relevant, RelevantFragment};
use crate::usage::{analyze_usages, ProjectIndex};

/// Commit/module attribution carried alongside one `C3Problem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcInfo {
    pub module: ModulePath,
    pub commit_hash: String,
}

/// One contextual code-change prediction instance: an edited span plus ranked context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct C3Problem {
    pub span: ChangedSpan,
    pub relevant_changes: Vec<ChangedSpan>,
    pub relevant_unchanged: Vec<RelevantFragment>,
    pub src_info: SrcInfo,
}

/// Generates every `C3Problem` for one `ProjectChange`, gated by mode:
///
/// - **Training mode**: any non-Deleted span (Added or Modified) becomes a problem — there is
///   no predictable "after" text for a deletion, so those are never emitted even in training.
/// - **Eval mode**: only Modified spans whose innermost parent is a function body — the
///   narrower, reproducible "predict the new function body" setting.
///
/// Modules not present in `pre_edit_modules` (e.g. newly added this commit, with nothing to
/// offer as usage/relevance context) are skipped for relevance purposes but their spans are
/// still folded into `processed_cspans`.
pub fn generate_problems(
    project_change: &ProjectChange,
    pre_edit_modules: &IndexMap<ModulePath, JModule>,
    training_mode: bool,
    errors: &mut ErrorCounts,
) -> Vec<C3Problem> {
    let index = ProjectIndex::build(pre_edit_modules);
    let order = index.topological_order(pre_edit_modules);

    let mut processed: Vec<ChangedSpan> = Vec::new();
    let mut problems = Vec::new();

    for module_name in &order {
        let Some(module_change) = project_change.changed.get(module_name) else {
            continue;
        };
        if module_change.changed.is_empty() {
            continue;
        }

        let usages = pre_edit_modules.get(module_name).map(|pre_module| {
            let touched: HashSet<usize> = module_change
                .changed
                .iter()
                .flat_map(|cs| (cs.line_range.0..cs.line_range.1).chain(cs.header_line_range().0..cs.header_line_range().1))
                .collect();
            analyze_usages(pre_module, &index, &touched, errors)
        });

        for span in &module_change.changed {
            let gate = if training_mode {
                !span.change.is_deleted()
            } else {
                span.change.is_modified() && span.is_func_body()
            };

            if gate {
                let relevance = match &usages {
                    Some(u) => select_relevant(span, pre_edit_modules, u, &processed),
                    None => select_relevant(span, pre_edit_modules, &Default::default(), &processed),
                };
                problems.push(C3Problem {
                    span: span.clone(),
                    relevant_changes: relevance.relevant_changes,
                    relevant_unchanged: relevance.relevant_unchanged,
                    src_info: SrcInfo {
                        module: module_name.clone(),
                        commit_hash: project_change.commit_info.hash.clone(),
                    },
                });
            }
            processed.push(span.clone());
        }
    }

    problems
}
