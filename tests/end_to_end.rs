//! End-to-end scenarios: exercises the full replay -> problem -> token-packing pipeline the
//! way a caller of this crate actually would, rather than one component at a time.

use std::path::Path;
use std::process::Command;

use indexmap::IndexMap;

use coeditor_replay::{
    generate_problems, pack_problem, Change, ErrorCounts, JModule, ModuleChange, ModulePath,
    ProjectChange,
};

fn project_change(commit_hash: &str, summary: &str) -> ProjectChange {
    ProjectChange::new(coeditor_replay::CommitInfo {
        hash: commit_hash.to_string(),
        summary: summary.to_string(),
        author: None,
        timestamp: None,
    })
}

/// Scenario: a single-function edit produces exactly one `C3Problem`, whose query chunk
/// carries both the old and new lines, and which packs to exactly one `TkC3Problem`.
#[test]
fn single_function_edit_produces_one_problem_and_one_record() {
    let old = JModule::parse(
        ModulePath::from_dotted("pkg.mod"),
        "def total(items):\n    return sum(items)\n",
    );
    let new = JModule::parse(
        ModulePath::from_dotted("pkg.mod"),
        "def total(items):\n    return sum(items) + 1\n",
    );
    let mut pre = IndexMap::new();
    pre.insert(ModulePath::from_dotted("pkg.mod"), old.clone());

    let mut pc = project_change("c1", "add one to total");
    pc.insert(ModuleChange::from_modules(Change::Modified(old, new)));

    let mut errors = ErrorCounts::default();
    let problems = generate_problems(&pc, &pre, true, &mut errors);
    assert_eq!(problems.len(), 1);
    assert!(problems[0].span.is_func_body());

    let config = coeditor_replay::ReplayConfig::default();
    let records = pack_problem(&problems[0], &config);
    assert_eq!(records.len(), 1);
    assert!(records[0].output_tks.contains(&coeditor_replay::TokenVocab::ADD));
    assert!(records[0].output_tks.contains(&coeditor_replay::TokenVocab::DEL));
}

/// Scenario: editing a callee surfaces the caller's unchanged body (or vice versa) as relevant
/// context, across module boundaries, resolved through the project-local import index.
#[test]
fn cross_module_usage_surfaces_relevant_context() {
    let helper_old = JModule::parse(ModulePath::from_dotted("lib.helper"), "def double(x):\n    return x * 2\n");
    let caller_old = JModule::parse(
        ModulePath::from_dotted("app.main"),
        "from lib.helper import double\n\ndef run(x):\n    return double(x)\n",
    );
    let caller_new = JModule::parse(
        ModulePath::from_dotted("app.main"),
        "from lib.helper import double\n\ndef run(x):\n    return double(x) + 1\n",
    );

    let mut pre = IndexMap::new();
    pre.insert(ModulePath::from_dotted("lib.helper"), helper_old.clone());
    pre.insert(ModulePath::from_dotted("app.main"), caller_old.clone());

    let mut pc = project_change("c1", "adjust run");
    pc.insert(ModuleChange::from_modules(Change::Modified(caller_old, caller_new)));

    let mut errors = ErrorCounts::default();
    let problems = generate_problems(&pc, &pre, true, &mut errors);
    assert_eq!(problems.len(), 1);
    let unchanged = &problems[0].relevant_unchanged;
    assert!(unchanged.iter().any(|f| f.path.full_name() == "lib.helper.double"));
}

/// Scenario: an added function is a training instance but not an eval instance (eval mode is
/// restricted to Modified function bodies).
#[test]
fn added_function_is_training_only() {
    let old = JModule::parse(ModulePath::from_dotted("m"), "def f():\n    pass\n");
    let new = JModule::parse(
        ModulePath::from_dotted("m"),
        "def f():\n    pass\n\ndef brand_new():\n    return 42\n",
    );
    let mut pre = IndexMap::new();
    pre.insert(ModulePath::from_dotted("m"), old.clone());

    let mut pc = project_change("c1", "add brand_new");
    pc.insert(ModuleChange::from_modules(Change::Modified(old, new)));

    let mut errors = ErrorCounts::default();
    assert!(generate_problems(&pc, &pre, false, &mut errors).is_empty());

    let training = generate_problems(&pc, &pre, true, &mut errors);
    assert_eq!(training.len(), 1);
    assert_eq!(training[0].span.change.as_char(), 'A');

    let config = coeditor_replay::ReplayConfig::default();
    let records = pack_problem(&training[0], &config);
    assert_eq!(records.len(), 1);
    assert!(!records[0].output_tks.contains(&coeditor_replay::TokenVocab::DEL));
}

/// Scenario: a large, many-line edit is split across several query chunks, each individually
/// bounded by `max_lines_to_edit`, and the packer never exceeds `max_chunks_per_elem`.
#[test]
fn multi_line_edit_splits_into_bounded_chunks() {
    let before_body: String = (0..24).map(|i| format!("    v{i} = {i}\n")).collect();
    let after_body: String = (0..24).map(|i| format!("    v{i} = {}\n", i + 100)).collect();
    let old = JModule::parse(ModulePath::from_dotted("m"), &format!("def f():\n{before_body}"));
    let new = JModule::parse(ModulePath::from_dotted("m"), &format!("def f():\n{after_body}"));

    let mut pre = IndexMap::new();
    pre.insert(ModulePath::from_dotted("m"), old.clone());

    let mut pc = project_change("c1", "renumber");
    pc.insert(ModuleChange::from_modules(Change::Modified(old, new)));

    let mut errors = ErrorCounts::default();
    let problems = generate_problems(&pc, &pre, true, &mut errors);
    assert_eq!(problems.len(), 1);

    let config = coeditor_replay::ReplayConfig {
        max_lines_to_edit: 5,
        max_chunks_per_elem: 6,
        ..Default::default()
    };
    let records = pack_problem(&problems[0], &config);
    assert!(records.len() > 1, "expected the edit to be split across multiple chunks");
    assert!(records.len() <= config.max_chunks_per_elem);
    for record in &records {
        assert!(record.output_tks.contains(&coeditor_replay::TokenVocab::ADD));
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .status()
        .expect("git must be on PATH for this test");
    assert!(status.success(), "git {args:?} failed in {dir:?}");
}

fn init_repo(dir: &Path) {
    run_git(dir, &["init", "--quiet"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test"]);
}

fn commit_all(dir: &Path, message: &str) -> String {
    run_git(dir, &["add", "-A"]);
    run_git(dir, &["commit", "--quiet", "-m", message]);
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "HEAD"])
        .output()
        .expect("git rev-parse must succeed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

/// Scenario: a pure file rename is reported as a delete of the old path plus an add of the new
/// one, not a single in-place "rename" change kind.
#[test]
fn file_rename_is_reported_as_delete_plus_add() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    init_repo(root);

    std::fs::create_dir_all(root.join("pkg")).unwrap();
    std::fs::write(root.join("pkg/a.py"), "def f():\n    return 1\n").unwrap();
    let c1 = commit_all(root, "add a.py");

    std::fs::rename(root.join("pkg/a.py"), root.join("pkg/b.py")).unwrap();
    let c2 = commit_all(root, "rename a.py to b.py");

    let repo = coeditor_replay::GitRepo::open(root);
    let changes = repo.changed_files(&c1, &c2).unwrap();

    let deleted = changes
        .iter()
        .any(|c| c.path == "pkg/a.py" && matches!(c.status, coeditor_replay::replay::FileStatus::Deleted));
    let added = changes
        .iter()
        .any(|c| c.path == "pkg/b.py" && matches!(c.status, coeditor_replay::replay::FileStatus::Added));
    assert!(deleted, "expected pkg/a.py to be reported deleted: {changes:?}");
    assert!(added, "expected pkg/b.py to be reported added: {changes:?}");
}

/// Scenario: with `time_limit_per_commit` set to zero, every commit is skipped (counted as a
/// per-commit failure) and no problems are produced, but replay still completes rather than
/// erroring out.
#[test]
fn zero_time_budget_skips_every_commit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    init_repo(root);

    std::fs::write(root.join("m.py"), "def f():\n    return 1\n").unwrap();
    commit_all(root, "initial");
    std::fs::write(root.join("m.py"), "def f():\n    return 2\n").unwrap();
    commit_all(root, "bump");

    let repo = coeditor_replay::GitRepo::open(root);
    let commits = repo.commit_log(None).unwrap();
    assert_eq!(commits.len(), 2);

    let config = coeditor_replay::ReplayConfig {
        time_limit_per_commit: 0.0,
        ..Default::default()
    };
    let mut driver = coeditor_replay::ReplayDriver::new(root, commits, config, true).unwrap();
    let outcome = driver.run().unwrap();

    assert!(outcome.problems.is_empty());
    assert!(outcome.error_counts.per_commit_failures > 0);
}
