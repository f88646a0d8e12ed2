//! Token packer (component I): turns one `C3Problem` into a non-empty sequence of
//! `TkC3Problem`s, each a self-contained, budget-bounded training/eval record. Grounded on
//! `TkC3Problem`/`C3ProblemTokenizer.tokenize_problem` in `ctx_change_encoder.py`, following a
//! three-step pipeline: reference tokenization, query construction, record assembly.

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::config::ReplayConfig;
use crate::delta::{split_lines, DeltaToken, LineDelta};
use crate::path::ProjectPath;
use crate::problem::{C3Problem, SrcInfo};

use super::cache::{content_key, FifoCache};
use super::vocab::{TokenId, TokenVocab};

/// One packed, budget-bounded training/eval record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TkC3Problem {
    pub input_tks: Vec<TokenId>,
    pub output_tks: Vec<TokenId>,
    pub path: ProjectPath,
    pub change_type: char,
    /// Named reference chunks packed alongside the query, in priority order: changed
    /// references (previously-seen edits this commit), then unchanged references (definitions
    /// the edit relies on), greedily packed against `max_total_ref_tks`.
    pub named_references: Vec<(String, Vec<TokenId>)>,
    pub src_info: SrcInfo,
}

/// Tokenizes and packs every `TkC3Problem` for one `C3Problem`. Caches are per-call here;
/// [`crate::driver::ReplayDriver`] owns the long-lived caches shared across a whole replay run.
pub fn pack_problem(problem: &C3Problem, config: &ReplayConfig) -> Vec<TkC3Problem> {
    let vocab = TokenVocab;
    let mut cache: FifoCache<Vec<TokenId>> = FifoCache::new(1000);

    let references = tokenize_references(problem, config, &vocab, &mut cache);
    let scope_header = truncate_from_left(&vocab.encode(&problem.span.path().full_name()), config.max_scope_tks);
    // BOS + scope_header + NEWLINE + EOS wraps every chunk_input; BOS + EOS wraps every
    // chunk_output. Budget the inner chunks against what's left so the assembled record never
    // exceeds max_query_tks/max_output_tks once the wrapping is added back.
    let input_overhead = scope_header.len() + 3;
    let output_overhead = 2;
    let chunks = build_query_chunks(problem, config, &vocab, input_overhead, output_overhead);

    let mut out = Vec::new();
    for (chunk_input, chunk_output) in chunks {
        let has_edit = chunk_output
            .iter()
            .any(|&id| id == TokenVocab::ADD || id == TokenVocab::DEL);
        if config.skip_unchanged_problems && !has_edit {
            continue;
        }

        let mut input_tks = Vec::with_capacity(scope_header.len() + chunk_input.len() + 4);
        input_tks.push(TokenVocab::BOS);
        input_tks.extend_from_slice(&scope_header);
        input_tks.push(TokenVocab::NEWLINE);
        input_tks.extend(chunk_input);
        input_tks.push(TokenVocab::EOS);

        let mut output_tks = Vec::with_capacity(chunk_output.len() + 2);
        output_tks.push(TokenVocab::BOS);
        output_tks.extend(chunk_output);
        output_tks.push(TokenVocab::EOS);

        let named_references = pack_references(&references, config.max_total_ref_tks);

        out.push(TkC3Problem {
            input_tks,
            output_tks,
            path: problem.span.path(),
            change_type: problem.span.change.as_char(),
            named_references,
            src_info: problem.src_info.clone(),
        });

        if out.len() >= config.max_chunks_per_elem {
            break;
        }
    }
    out
}

/// Step 1: tokenizes every `relevant_changes`/`relevant_unchanged` entry into one or more
/// named, overlapping chunks capped at `max_ref_tks`, named `"changed ref {i}"` /
/// `"unchanged ref {i}"`. Each entry is tagged with a scope-header line so a reader (or the
/// model) can tell which definition a reference chunk belongs to.
fn tokenize_references(
    problem: &C3Problem,
    config: &ReplayConfig,
    vocab: &TokenVocab,
    cache: &mut FifoCache<Vec<TokenId>>,
) -> Vec<(String, Vec<TokenId>)> {
    let mut out = Vec::new();

    for (i, change) in problem.relevant_changes.iter().enumerate() {
        let header = change.path().full_name();
        let body = match &change.change {
            Change::Added(after) => after.clone(),
            Change::Deleted(before) => before.clone(),
            Change::Modified(before, after) => format!("{before}\n{after}"),
        };
        let tokens = tokenize_cached(&header, &body, vocab, cache);
        for (j, chunk) in chunk_tokens(&tokens, config.max_ref_tks, config.ref_chunk_overlap)
            .into_iter()
            .enumerate()
        {
            let label = if j == 0 {
                format!("changed ref {i}")
            } else {
                format!("changed ref {i}.{j}")
            };
            out.push((label, chunk));
        }
    }

    for (i, fragment) in problem.relevant_unchanged.iter().enumerate() {
        let header = fragment.path.full_name();
        let tokens = tokenize_cached(&header, &fragment.code, vocab, cache);
        for (j, chunk) in chunk_tokens(&tokens, config.max_ref_tks, config.ref_chunk_overlap)
            .into_iter()
            .enumerate()
        {
            let label = if j == 0 {
                format!("unchanged ref {i}")
            } else {
                format!("unchanged ref {i}.{j}")
            };
            out.push((label, chunk));
        }
    }

    out
}

fn tokenize_cached(header: &str, body: &str, vocab: &TokenVocab, cache: &mut FifoCache<Vec<TokenId>>) -> Vec<TokenId> {
    let key = content_key(&format!("{header}\u{0}{body}"));
    if let Some(cached) = cache.get(&key) {
        return cached.clone();
    }
    let mut tokens = vocab.encode(header);
    tokens.push(TokenVocab::NEWLINE);
    tokens.extend(vocab.encode(body));
    cache.insert(key, tokens.clone());
    tokens
}

/// Splits `tokens` into overlapping windows of at most `max_len`, each window starting
/// `max_len - overlap` tokens after the previous one. A single chunk if `tokens` already fits.
fn chunk_tokens(tokens: &[TokenId], max_len: usize, overlap: usize) -> Vec<Vec<TokenId>> {
    if tokens.len() <= max_len || max_len == 0 {
        return vec![tokens.to_vec()];
    }
    let stride = max_len.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + max_len).min(tokens.len());
        out.push(tokens[start..end].to_vec());
        if end == tokens.len() {
            break;
        }
        start += stride;
    }
    out
}

/// Greedily packs `references` in order until the next one would exceed `max_total_ref_tks`.
fn pack_references(references: &[(String, Vec<TokenId>)], budget: usize) -> Vec<(String, Vec<TokenId>)> {
    let mut out = Vec::new();
    let mut used = 0usize;
    for (name, tokens) in references {
        if used + tokens.len() > budget {
            continue;
        }
        used += tokens.len();
        out.push((name.clone(), tokens.clone()));
    }
    out
}

fn truncate_from_left(tokens: &[TokenId], max_len: usize) -> Vec<TokenId> {
    if tokens.len() <= max_len {
        tokens.to_vec()
    } else {
        tokens[tokens.len() - max_len..].to_vec()
    }
}

/// Step 2: walks the span's line delta, accumulating original-line context into `chunk_input`
/// and edit tokens into `chunk_output`, closing a chunk at `max_lines_to_edit` lines, at either
/// token budget, or at the end of the delta — and stopping after `max_chunks_per_elem` chunks.
fn build_query_chunks(
    problem: &C3Problem,
    config: &ReplayConfig,
    vocab: &TokenVocab,
    input_overhead: usize,
    output_overhead: usize,
) -> Vec<(Vec<TokenId>, Vec<TokenId>)> {
    let (original_lines, tk_delta) = change_delta(&problem.span.change);
    let max_input = config.max_query_tks.saturating_sub(input_overhead).max(1);
    let max_output = config.max_output_tks.saturating_sub(output_overhead).max(1);

    let mut chunks = Vec::new();
    let mut chunk_input: Vec<TokenId> = Vec::new();
    let mut chunk_output: Vec<TokenId> = Vec::new();
    let mut chunk_lines = 0usize;

    for (i, gap) in tk_delta.iter().enumerate() {
        let is_last_gap = i == tk_delta.len() - 1;
        let deleted_here = gap.iter().any(|t| matches!(t, DeltaToken::Del));
        let has_marker = !gap.is_empty();

        // What this gap would add, computed before committing it, so a single bursty gap
        // (many adds/deletes at one position) can't silently carry a chunk past budget.
        let gap_output_len: usize = if has_marker {
            1 + gap
                .iter()
                .map(|tok| match tok {
                    DeltaToken::Add(line) => 2 + vocab.encode(line).len(),
                    DeltaToken::Del => 1,
                })
                .sum::<usize>()
        } else {
            0
        };
        let line_input_len = if !is_last_gap && !deleted_here {
            vocab.encode(&original_lines[i]).len() + 1
        } else {
            0
        };
        let gap_input_len = if has_marker { 1 } else { 0 } + line_input_len;

        let would_overflow = chunk_output.len() + gap_output_len > max_output
            || chunk_input.len() + gap_input_len > max_input
            || (chunk_lines >= config.max_lines_to_edit && !is_last_gap);
        if would_overflow && (!chunk_input.is_empty() || !chunk_output.is_empty()) {
            chunks.push((std::mem::take(&mut chunk_input), std::mem::take(&mut chunk_output)));
            chunk_lines = 0;
            if chunks.len() >= config.max_chunks_per_elem {
                return chunks;
            }
        }

        if has_marker {
            let marker = TokenVocab::extra_id(chunk_lines);
            chunk_input.push(marker);
            chunk_output.push(marker);
            for tok in gap {
                match tok {
                    DeltaToken::Add(line) => {
                        chunk_output.push(TokenVocab::ADD);
                        chunk_output.extend(vocab.encode(line));
                        chunk_output.push(TokenVocab::NEWLINE);
                    }
                    DeltaToken::Del => {
                        chunk_output.push(TokenVocab::DEL);
                    }
                }
            }
        }

        if !is_last_gap {
            if !deleted_here {
                chunk_input.extend(vocab.encode(&original_lines[i]));
                chunk_input.push(TokenVocab::NEWLINE);
            }
            chunk_lines += 1;
        }
    }

    if !chunk_input.is_empty() || !chunk_output.is_empty() {
        chunks.push((chunk_input, chunk_output));
    }
    if chunks.is_empty() {
        chunks.push((Vec::new(), Vec::new()));
    }
    chunks
}

/// Converts a span's `Change<String>` into `(original_lines, token_delta)`, uniformly covering
/// `Added` (no original lines, one gap of pure insertions) and `Deleted` (all lines deleted,
/// no insertions) the same way `Modified` is handled.
fn change_delta(change: &Change<String>) -> (Vec<String>, Vec<Vec<DeltaToken>>) {
    match change {
        Change::Added(after) => {
            let new_lines = split_lines(after);
            let delta = LineDelta::compute(&[], &new_lines);
            (Vec::new(), delta.to_tk_delta())
        }
        Change::Deleted(before) => {
            let old_lines = split_lines(before);
            let delta = LineDelta::compute(&old_lines, &[]);
            (old_lines, delta.to_tk_delta())
        }
        Change::Modified(before, after) => {
            let old_lines = split_lines(before);
            let new_lines = split_lines(after);
            let delta = LineDelta::compute(&old_lines, &new_lines);
            (old_lines, delta.to_tk_delta())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::ChangedSpan;
    use crate::path::ModulePath;
    use crate::scope::{ScopeHeader, ScopeKind};

    fn leaf_span(change: Change<String>, path: &str) -> ChangedSpan {
        let module = ModulePath::from_dotted("m");
        let pp = ProjectPath::new(module, path.trim_start_matches("m."));
        ChangedSpan {
            change,
            parent_scopes: vec![Change::from_unchanged(ScopeHeader {
                path: pp,
                kind: ScopeKind::Function,
                header_line_range: (0, 1),
            })],
            line_range: (0, 1),
        }
    }

    fn problem(change: Change<String>) -> C3Problem {
        C3Problem {
            span: leaf_span(change, "m.f"),
            relevant_changes: Vec::new(),
            relevant_unchanged: Vec::new(),
            src_info: SrcInfo {
                module: ModulePath::from_dotted("m"),
                commit_hash: "c1".into(),
            },
        }
    }

    #[test]
    fn modified_span_produces_one_record_with_both_edit_tokens() {
        let p = problem(Change::Modified("return x".into(), "return x + 1".into()));
        let cfg = ReplayConfig::default();
        let records = pack_problem(&p, &cfg);
        assert_eq!(records.len(), 1);
        let out = &records[0].output_tks;
        assert!(out.contains(&TokenVocab::ADD));
        assert!(out.contains(&TokenVocab::DEL));
        assert_eq!(records[0].change_type, 'M');
    }

    #[test]
    fn unchanged_problem_is_skipped_when_configured_to() {
        let p = problem(Change::Modified("return x".into(), "return x".into()));
        let cfg = ReplayConfig::default();
        let records = pack_problem(&p, &cfg);
        assert!(records.is_empty());
    }

    #[test]
    fn respects_max_lines_to_edit_by_splitting_into_multiple_chunks() {
        let before = (0..10).map(|i| format!("a{i} = {i}")).collect::<Vec<_>>().join("\n");
        let after = (0..10).map(|i| format!("a{i} = {}", i + 1)).collect::<Vec<_>>().join("\n");
        let p = problem(Change::Modified(before, after));
        let cfg = ReplayConfig {
            max_lines_to_edit: 3,
            max_chunks_per_elem: 10,
            ..Default::default()
        };
        let records = pack_problem(&p, &cfg);
        assert!(records.len() > 1);
        assert!(records.len() <= cfg.max_chunks_per_elem);
    }

    #[test]
    fn never_exceeds_max_chunks_per_elem() {
        let before = (0..50).map(|i| format!("a{i} = {i}")).collect::<Vec<_>>().join("\n");
        let after = (0..50).map(|i| format!("a{i} = {}", i + 1)).collect::<Vec<_>>().join("\n");
        let p = problem(Change::Modified(before, after));
        let cfg = ReplayConfig {
            max_lines_to_edit: 1,
            max_chunks_per_elem: 3,
            ..Default::default()
        };
        let records = pack_problem(&p, &cfg);
        assert!(records.len() <= 3);
    }

    #[test]
    fn records_never_exceed_their_configured_token_budgets() {
        let before = (0..50).map(|i| format!("a{i} = {i}")).collect::<Vec<_>>().join("\n");
        let after = (0..50).map(|i| format!("a{i} = {}", i + 1)).collect::<Vec<_>>().join("\n");
        let mut p = problem(Change::Modified(before, after));
        p.relevant_unchanged = (0..5)
            .map(|i| crate::relevance::RelevantFragment {
                module: ModulePath::from_dotted("m"),
                path: ProjectPath::new(ModulePath::from_dotted("m"), format!("helper{i}")),
                line_range: (0, 3),
                code: format!("def helper{i}():\n    return {i} * 2\n"),
                elided_ancestors: 0,
            })
            .collect();

        let cfg = ReplayConfig {
            max_query_tks: 40,
            max_output_tks: 20,
            max_scope_tks: 8,
            max_ref_tks: 16,
            max_total_ref_tks: 30,
            max_lines_to_edit: 3,
            max_chunks_per_elem: 20,
            ..Default::default()
        };
        let records = pack_problem(&p, &cfg);
        assert!(!records.is_empty());
        for record in &records {
            assert!(record.input_tks.len() <= cfg.max_query_tks, "{}", record.input_tks.len());
            assert!(record.output_tks.len() <= cfg.max_output_tks, "{}", record.output_tks.len());
            for (_, tokens) in &record.named_references {
                assert!(tokens.len() <= cfg.max_ref_tks);
            }
            let total_ref_tks: usize = record.named_references.iter().map(|(_, t)| t.len()).sum();
            assert!(total_ref_tks <= cfg.max_total_ref_tks);
        }
    }

    #[test]
    fn packing_is_idempotent() {
        let p = problem(Change::Modified("return x".into(), "return x + 1".into()));
        let cfg = ReplayConfig::default();
        assert_eq!(pack_problem(&p, &cfg), pack_problem(&p, &cfg));
    }

    #[test]
    fn added_span_has_no_deletion_tokens() {
        let p = problem(Change::Added("return 1".into()));
        let cfg = ReplayConfig::default();
        let records = pack_problem(&p, &cfg);
        assert_eq!(records.len(), 1);
        assert!(!records[0].output_tks.contains(&TokenVocab::DEL));
        assert!(records[0].output_tks.contains(&TokenVocab::ADD));
    }

    #[test]
    fn chunk_tokens_overlaps_consecutive_windows() {
        let tokens: Vec<TokenId> = (0..10).collect();
        let chunks = chunk_tokens(&tokens, 4, 2);
        assert!(chunks.len() > 1);
        // Consecutive chunks share `overlap` tokens at the boundary.
        assert_eq!(chunks[0][chunks[0].len() - 2..], chunks[1][..2]);
    }
}
