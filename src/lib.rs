//! Replays a project's git history into ranked, scope-aware contextual code-change problems
//! (C3 problems) and packs them into bounded token layouts for sequence-to-sequence training.
//!
//! The pipeline is a straight line through the modules below: [`change`] and [`delta`] are the
//! shared primitives (components A/B); [`scope`] decomposes one module's source into a tree of
//! definitions (C); [`differ`] turns a before/after scope tree pair into the flat list of
//! things that actually changed (D); [`replay`] walks a commit history, feeding each commit's
//! file-level changes through the differ (E); [`usage`] resolves cross-module name references
//! (F); [`relevance`] picks the context worth showing alongside an edit (G); [`problem`] gates
//! and assembles the final `C3Problem`s (H); and [`token`] tokenizes and packs them into
//! bounded records (I). [`driver`] wires E through I into the one external entry point.

pub mod change;
pub mod config;
pub mod delta;
pub mod differ;
pub mod driver;
pub mod errors;
pub mod module;
pub mod path;
pub mod problem;
pub mod relevance;
pub mod replay;
pub mod scope;
pub mod token;
pub mod usage;

pub use change::Change;
pub use config::ReplayConfig;
pub use delta::LineDelta;
pub use differ::{diff_module, ChangedSpan};
pub use driver::{CancelFlag, ReplayDriver, ReplayOutcome};
pub use errors::{CoeditorError, ErrorCounts, Result};
pub use module::{CommitInfo, JModule, ModuleChange, ProjectChange};
pub use path::{ModulePath, ProjectPath};
pub use problem::{generate_problems, C3Problem, SrcInfo};
pub use relevance::{select_relevant, RelevantFragment};
pub use replay::{diff_commit, GitRepo, ReplayWorkspace};
pub use scope::{ScopeHeader, ScopeKind, ScopeTree, StatementSpan};
pub use token::{pack_problem, TkC3Problem, TokenVocab};
pub use usage::{analyze_usages, LineUsageAnalysis, ProjectIndex, PyDefinition};
