//! Scope tree builder (component C): decomposes one module's source into a tree of
//! module/class/function scopes and the statement spans that live directly inside each,
//! mirroring the original `ChangeScope`/`StatementSpan` split (see `code_change.py`) without
//! embedding a real parser — nesting is inferred from indentation per `line_model`.

pub mod line_model;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::delta::split_lines;
use crate::path::ProjectPath;
use line_model::{classify, header_name, import_bound_names, import_origins, indent_of, is_blank, LineKind};

/// What kind of scope a `ScopeTree` node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
}

/// A contiguous run of non-scope statements living directly inside a scope (i.e. not inside
/// any of that scope's visible subscopes). Functions are represented by exactly one span
/// covering the whole decorated function, since nested definitions are "hidden" inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSpan {
    pub code: String,
    /// `[start, end)` absolute line range in the owning module, after leading blank lines
    /// have been stripped out into `prefix_empty_lines`.
    pub line_range: (usize, usize),
    pub prefix_empty_lines: usize,
}

/// Lightweight reference to an ancestor scope, carried in `ChangedSpan::parent_scopes`
/// (component D) without dragging along that ancestor's full subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeHeader {
    pub path: ProjectPath,
    pub kind: ScopeKind,
    pub header_line_range: (usize, usize),
}

/// A module, class, or function scope and everything nested directly inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTree {
    pub path: ProjectPath,
    pub kind: ScopeKind,
    /// Declaration line(s) — decorators through the `def`/`class` line itself. Empty
    /// (`(0, 0)`) for the module scope, which has no declaration of its own.
    pub header_line_range: (usize, usize),
    /// Statement spans directly inside this scope, in source order, interleaved with
    /// `subscopes` but kept in a separate list (mirrors `ChangeScope.spans`).
    pub spans: Vec<StatementSpan>,
    /// Nested class/function scopes, keyed by path, insertion-ordered to match source order.
    pub subscopes: IndexMap<ProjectPath, ScopeTree>,
    /// Names bound by `import`/`from ... import ...` statements directly inside this scope
    /// (only meaningful for the module scope; tracked uniformly for simplicity).
    pub imported_names: Vec<String>,
    /// `(bound_name, source_module, original_name)` triples for every import directly inside
    /// this scope, consumed by the usage analyzer's project-local resolver.
    pub import_origins: Vec<(String, String, String)>,
}

impl ScopeTree {
    pub fn header(&self) -> ScopeHeader {
        ScopeHeader {
            path: self.path.clone(),
            kind: self.kind,
            header_line_range: self.header_line_range,
        }
    }

    /// Concatenates this scope's own spans' code, in source order — *not* including any
    /// subscope bodies. This is what the differ diffs against.
    pub fn spans_code(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.code.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The last absolute line (exclusive) any part of this scope (spans or subscopes) reaches.
    pub fn content_end(&self) -> usize {
        scope_full_end(self)
    }

    /// This scope's full extent as seen by its parent: header through last content line
    /// (from line 0 for the module scope, which has no header of its own).
    pub fn full_line_range(&self) -> (usize, usize) {
        let start = if self.kind == ScopeKind::Module {
            0
        } else {
            self.header_line_range.0
        };
        (start, self.content_end())
    }

    /// Builds the scope tree for one module's full source text.
    pub fn build_module(path: ProjectPath, source: &str) -> ScopeTree {
        let lines = split_lines(source);
        let body_end = lines.len();
        let body = build_body(&path, &lines, 0, body_end, 0);
        ScopeTree {
            path,
            kind: ScopeKind::Module,
            header_line_range: (0, 0),
            spans: body.spans,
            subscopes: body.subscopes,
            imported_names: body.imported_names,
            import_origins: body.import_origins,
        }
    }
}

struct BodyResult {
    spans: Vec<StatementSpan>,
    subscopes: IndexMap<ProjectPath, ScopeTree>,
    imported_names: Vec<String>,
    import_origins: Vec<(String, String, String)>,
    /// Absolute line index one past the last real content line this body covers.
    content_end: usize,
}

/// Parses the body of a module or class scope: `lines` is the *whole module's* lines (so
/// absolute indices line up with `ProjectPath`-free callers), `body_start`/`body_end` bound
/// the region to scan, and `base_indent` is the indentation level of this body's own
/// statements. Functions never call this recursively on their own body — their whole text
/// becomes one opaque span instead.
fn build_body(
    parent_path: &ProjectPath,
    lines: &[String],
    body_start: usize,
    body_end: usize,
    base_indent: usize,
) -> BodyResult {
    // Top-level content positions: non-blank lines at exactly `base_indent`.
    let content_positions: Vec<usize> = (body_start..body_end)
        .filter(|&i| !is_blank(&lines[i]) && indent_of(&lines[i]) == base_indent)
        .collect();

    // Merge decorator runs with the header line they decorate into a single boundary.
    let mut boundaries: Vec<usize> = Vec::new();
    let mut in_decorator_run = false;
    for &pos in &content_positions {
        let is_decorator = classify(&lines[pos]) == LineKind::Decorator;
        if is_decorator {
            if !in_decorator_run {
                boundaries.push(pos);
                in_decorator_run = true;
            }
        } else {
            if !in_decorator_run {
                boundaries.push(pos);
            }
            in_decorator_run = false;
        }
    }

    let mut spans = Vec::new();
    let mut subscopes = IndexMap::new();
    let mut imported_names = Vec::new();
    let mut origins = Vec::new();

    let mut raw_start = body_start;
    // Pending run of consecutive plain/flow blocks, accumulated into one StatementSpan.
    let mut pending_start: Option<usize> = None;
    let mut pending_end: usize = body_start;

    let mut flush_pending = |pending_start: &mut Option<usize>, pending_end: usize, spans: &mut Vec<StatementSpan>, raw_start: usize| {
        if let Some(start) = pending_start.take() {
            let code = lines[start..pending_end].join("\n");
            spans.push(StatementSpan {
                code,
                line_range: (start, pending_end),
                prefix_empty_lines: start - raw_start,
            });
        }
    };

    for (idx, &boundary) in boundaries.iter().enumerate() {
        let next_boundary = boundaries.get(idx + 1).copied().unwrap_or(body_end);
        // Find the header keyword line (first non-decorator content line from `boundary`).
        let header_line = (boundary..next_boundary)
            .find(|&i| {
                !is_blank(&lines[i])
                    && indent_of(&lines[i]) == base_indent
                    && classify(&lines[i]) != LineKind::Decorator
            })
            .unwrap_or(boundary);
        let header_kind = classify(&lines[header_line]);

        match header_kind {
            LineKind::DefHeader | LineKind::ClassHeader => {
                // A def/class boundary ends any pending plain-statement run.
                flush_pending(&mut pending_start, pending_end, &mut spans, raw_start);

                let name = header_name(&lines[header_line]).unwrap_or_else(|| "_".to_string());
                let child_path = parent_path.append(&name);
                let child_kind = if header_kind == LineKind::DefHeader {
                    ScopeKind::Function
                } else {
                    ScopeKind::Class
                };

                let (nested_body_indent, nested_body_start) =
                    first_deeper_line(lines, header_line + 1, next_boundary, base_indent);

                let (content_end, nested) = if let Some(inner_indent) = nested_body_indent {
                    let nested_body_end = find_dedent(lines, nested_body_start, next_boundary, inner_indent);
                    match child_kind {
                        ScopeKind::Class => {
                            let _ = nested_body_start;
                            let nested_result = build_body(
                                &child_path,
                                lines,
                                header_line + 1,
                                next_boundary,
                                inner_indent,
                            );
                            (nested_result.content_end.max(header_line + 1), Some(nested_result))
                        }
                        // Functions never recurse: the whole body is opaque span material.
                        _ => (nested_body_end, None),
                    }
                } else {
                    (header_line + 1, None)
                };

                let full_start = boundary;
                let header_line_range = (boundary, header_line + 1);

                let child = match nested {
                    Some(nested_result) => ScopeTree {
                        path: child_path.clone(),
                        kind: child_kind,
                        header_line_range,
                        spans: nested_result.spans,
                        subscopes: nested_result.subscopes,
                        imported_names: nested_result.imported_names,
                        import_origins: nested_result.import_origins,
                    },
                    None => {
                        let code = lines[full_start..content_end].join("\n");
                        ScopeTree {
                            path: child_path.clone(),
                            kind: child_kind,
                            header_line_range,
                            spans: vec![StatementSpan {
                                code,
                                line_range: (full_start, content_end),
                                prefix_empty_lines: 0,
                            }],
                            subscopes: IndexMap::new(),
                            imported_names: Vec::new(),
                            import_origins: Vec::new(),
                        }
                    }
                };

                subscopes.insert(child_path, child);
                raw_start = content_end;
                pending_end = content_end;
            }
            LineKind::Import => {
                flush_pending(&mut pending_start, pending_end, &mut spans, raw_start);
                imported_names.extend(import_bound_names(&lines[header_line]));
                origins.extend(import_origins(&lines[header_line]));
                // Imports are dropped from span material entirely; the next boundary's
                // leading gap (including this import line) becomes its own prefix.
                raw_start = header_line + 1;
                pending_end = raw_start;
            }
            LineKind::Plain | LineKind::Decorator => {
                // A decorator run with no recognizable header behind it: treat the whole
                // thing as an ordinary statement block (defensive fallback, not expected
                // for well-formed input).
                let block_end = next_boundary;
                if pending_start.is_none() {
                    pending_start = Some(boundary);
                }
                pending_end = last_non_blank(lines, boundary, block_end).unwrap_or(pending_end);
            }
        }
    }

    flush_pending(&mut pending_start, pending_end, &mut spans, raw_start);
    let content_end = spans
        .last()
        .map(|s| s.line_range.1)
        .into_iter()
        .chain(subscopes.values().map(|s| scope_full_end(s)))
        .max()
        .unwrap_or(raw_start);

    BodyResult {
        spans,
        subscopes,
        imported_names,
        import_origins: origins,
        content_end,
    }
}

/// The last absolute line (exclusive) any part of `scope` (spans or subscopes) reaches.
fn scope_full_end(scope: &ScopeTree) -> usize {
    scope
        .spans
        .last()
        .map(|s| s.line_range.1)
        .into_iter()
        .chain(scope.subscopes.values().map(scope_full_end))
        .max()
        .unwrap_or(scope.header_line_range.1)
}

/// Finds the first non-blank line strictly after `from_line` (and before `limit`) that is
/// indented deeper than `base_indent`; returns its indentation and index, establishing the
/// nested body's own indentation level.
fn first_deeper_line(
    lines: &[String],
    from_line: usize,
    limit: usize,
    base_indent: usize,
) -> (Option<usize>, usize) {
    for i in from_line..limit {
        if is_blank(&lines[i]) {
            continue;
        }
        let indent = indent_of(&lines[i]);
        if indent > base_indent {
            return (Some(indent), i);
        }
        break;
    }
    (None, from_line)
}

/// Scans forward from `start` until a non-blank line indented less than `inner_indent` is
/// found (or `limit` reached), returning the index one past the last non-blank line in the
/// deeper block.
fn find_dedent(lines: &[String], start: usize, limit: usize, inner_indent: usize) -> usize {
    let mut last_content = start;
    for i in start..limit {
        if is_blank(&lines[i]) {
            continue;
        }
        if indent_of(&lines[i]) < inner_indent {
            break;
        }
        last_content = i + 1;
    }
    last_content
}

fn last_non_blank(lines: &[String], start: usize, end: usize) -> Option<usize> {
    (start..end).rev().find(|&i| !is_blank(&lines[i])).map(|i| i + 1)
}
