//! Driver facade (component M, ambient): the single external entry point wiring replay (E),
//! problem generation (H), and token packing (I) together. Grounded on
//! `JProjectChange.edits_from_commit_history` playing the same "one call replays everything"
//! role in `code_change.py`, and on a preference for a plain owning struct with one
//! `run`-shaped method over a builder/callback pipeline.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::{info, info_span, warn};

use crate::config::ReplayConfig;
use crate::errors::{CoeditorError, ErrorCounts, Result};
use crate::module::{CommitInfo, JModule};
use crate::path::ModulePath;
use crate::problem::{generate_problems, C3Problem};
use crate::replay::{diff_commit, ReplayWorkspace, EMPTY_TREE};
use crate::token::{pack_problem, TkC3Problem};

/// Cooperative cancellation: checked between commits so a caller running the driver on a
/// background thread can ask it to stop early without killing the process. Cloning shares the
/// same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one `ReplayDriver::run` call produces: every emitted problem, its packed token
/// records, and the non-fatal failure histogram accumulated along the way.
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    pub problems: Vec<C3Problem>,
    pub token_records: Vec<TkC3Problem>,
    pub error_counts: ErrorCounts,
}

impl ReplayOutcome {
    /// Dumps every packed token record as one JSON object per line, the dataset's on-disk
    /// exchange format. No custom binary format: whatever `serde_json` produces for the
    /// derived `Serialize` impl is the format.
    pub fn token_records_as_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for record in &self.token_records {
            let line = serde_json::to_string(record).map_err(|e| CoeditorError::CustomError(e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Replays one project's git history into `C3Problem`s and their packed token records.
///
/// A `ReplayDriver` instance is single-threaded: parallelism across projects or commit ranges
/// is the caller's responsibility, built on top of several driver instances each with their own
/// throwaway workspace and caches.
pub struct ReplayDriver {
    workspace: ReplayWorkspace,
    /// Commits newest-first, exactly as `GitRepo::commit_log` returns them; replayed
    /// oldest-first internally so each commit diffs against its immediate predecessor.
    commits: Vec<CommitInfo>,
    config: ReplayConfig,
    training_mode: bool,
    cancel: CancelFlag,
}

impl ReplayDriver {
    pub fn new(source_repo: &Path, commits: Vec<CommitInfo>, config: ReplayConfig, training_mode: bool) -> Result<Self> {
        let workspace = ReplayWorkspace::clone_from(source_repo)?;
        Ok(ReplayDriver {
            workspace,
            commits,
            config,
            training_mode,
            cancel: CancelFlag::new(),
        })
    }

    /// A handle that can be used from elsewhere (e.g. a signal handler) to request the next
    /// `run` call to stop early.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn run(&mut self) -> Result<ReplayOutcome> {
        let mut outcome = ReplayOutcome::default();
        let mut modules: IndexMap<ModulePath, JModule> = IndexMap::new();

        let oldest_first: Vec<CommitInfo> = self.commits.iter().rev().cloned().collect();
        for (i, commit) in oldest_first.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("replay cancelled before commit {}", commit.hash);
                break;
            }

            let span = info_span!("replay_commit", commit = %commit.hash);
            let _guard = span.enter();
            let started = Instant::now();

            if let Err(e) = self.workspace.repo().checkout_forced(&commit.hash) {
                warn!(error = %e, "skipping commit: checkout failed");
                outcome.error_counts.record_commit_failure();
                continue;
            }

            let parent_ref = if i == 0 {
                EMPTY_TREE.to_string()
            } else {
                format!("{}^", commit.hash)
            };

            let diffed = diff_commit(
                self.workspace.repo(),
                &modules,
                &parent_ref,
                commit,
                &self.config,
                &mut outcome.error_counts,
            );
            let (project_change, new_modules) = match diffed {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "skipping commit: diff failed");
                    outcome.error_counts.record_commit_failure();
                    continue;
                }
            };
            modules = new_modules;

            if started.elapsed().as_secs_f64() > self.config.time_limit_per_commit {
                warn!("skipping commit: exceeded per-commit time budget");
                outcome.error_counts.record_commit_failure();
                continue;
            }

            let problems = {
                let module_span = info_span!("reparse_and_analyze", commit = %commit.hash);
                let _guard = module_span.enter();
                generate_problems(&project_change, &modules, self.training_mode, &mut outcome.error_counts)
            };

            {
                let pack_span = info_span!("pack_tokens", commit = %commit.hash);
                let _guard = pack_span.enter();
                for problem in &problems {
                    outcome.token_records.extend(pack_problem(problem, &self.config));
                }
            }
            outcome.problems.extend(problems);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Lets `RUST_LOG=debug cargo test -- --nocapture` show replay spans/events; harmless
    /// no-op when a subscriber is already installed.
    pub(crate) fn init_logger() {
        let _ = tracing_subscriber::fmt::Subscriber::builder()
            .with_target(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish()
            .try_init();
    }

    #[test]
    fn token_records_as_jsonl_emits_one_object_per_line() {
        use crate::change::Change;
        use crate::module::{JModule, ModuleChange};
        use crate::path::ModulePath;

        let old = JModule::parse(ModulePath::from_dotted("m"), "def f():\n    return 1\n");
        let new = JModule::parse(ModulePath::from_dotted("m"), "def f():\n    return 2\n");
        let mut pre = IndexMap::new();
        pre.insert(ModulePath::from_dotted("m"), old.clone());

        let mut pc = crate::module::ProjectChange::new(CommitInfo {
            hash: "c1".into(),
            summary: "bump".into(),
            author: None,
            timestamp: None,
        });
        pc.insert(ModuleChange::from_modules(Change::Modified(old, new)));

        let mut errors = ErrorCounts::default();
        let problems = generate_problems(&pc, &pre, true, &mut errors);
        let config = ReplayConfig::default();

        let mut outcome = ReplayOutcome::default();
        for problem in &problems {
            outcome.token_records.extend(pack_problem(problem, &config));
        }

        let jsonl = outcome.token_records_as_jsonl().unwrap();
        let lines: Vec<&str> = jsonl.lines().collect();
        assert_eq!(lines.len(), outcome.token_records.len());
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("input_tks").is_some());
        }
    }

    #[test]
    fn cancel_flag_shares_state_across_clones() {
        init_logger();
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
