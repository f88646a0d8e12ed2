//! Line classification for the indentation-sensitive scope grammar.
//!
//! A full interpreter-grade parser is out of scope; this module supplies a concrete,
//! line-tagged stand-in that is sufficient to build the scope tree for a Python-shaped
//! grammar: `def`/`class` headers, decorator runs, and import statements are recognized by
//! their leading keyword, and nesting is inferred from indentation rather than from a real
//! grammar.

/// What one top-level content line looks like, once indentation has been stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Import,
    Decorator,
    DefHeader,
    ClassHeader,
    Plain,
}

/// Number of leading whitespace characters (space or tab counted as one column each; this
/// only needs to be consistent within one file, not match a terminal's tab width).
pub fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();
    if trimmed.starts_with('@') {
        LineKind::Decorator
    } else if trimmed.starts_with("def ") || trimmed.starts_with("async def ") {
        LineKind::DefHeader
    } else if trimmed.starts_with("class ") {
        LineKind::ClassHeader
    } else if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
        LineKind::Import
    } else {
        LineKind::Plain
    }
}

/// Extracts the declared name from a `def`/`class` header line, e.g. `"def foo(x):"` -> `"foo"`.
pub fn header_name(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let rest = trimmed
        .strip_prefix("async def ")
        .or_else(|| trimmed.strip_prefix("def "))
        .or_else(|| trimmed.strip_prefix("class "))?;
    let end = rest
        .find(|c: char| c == '(' || c == ':' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = rest[..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Names introduced by one import line (both `import a, b` and `from m import a, b as c`
/// forms; the bound name is what matters for usage resolution, not the source module for
/// `as` aliases we keep the alias since that's the name visible in the importing scope).
pub fn import_bound_names(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("from ") {
        match rest.split_once(" import ") {
            Some((_, names)) => names,
            None => return Vec::new(),
        }
    } else if let Some(rest) = trimmed.strip_prefix("import ") {
        rest
    } else {
        return Vec::new();
    };

    body.split(',')
        .filter_map(|part| {
            let part = part.trim().trim_matches(|c| c == '(' || c == ')');
            if part.is_empty() {
                return None;
            }
            // `x as y` binds `y`; a dotted `import a.b.c` binds the first segment `a`.
            let bound = if let Some((_, alias)) = part.split_once(" as ") {
                alias.trim()
            } else {
                part.split('.').next().unwrap_or(part).trim()
            };
            if bound.is_empty() {
                None
            } else {
                Some(bound.to_string())
            }
        })
        .collect()
}

/// `(bound_name, source_module, original_name)` triples for one import line:
/// `from a.b import c, d as e` yields `[("c","a.b","c"), ("e","a.b","d")]`;
/// `import a.b, c as cc` yields `[("a","a.b","a.b"), ("cc","c","c")]` (a bare module import
/// has no separate "original name" distinct from the module itself).
///
/// `original_name` is what must be looked up in the source module's own exports; `bound_name`
/// is what's visible under in the importing scope. Usage resolution needs both: one to follow
/// a re-export, the other to match an occurrence in the importing module's own text.
pub fn import_origins(line: &str) -> Vec<(String, String, String)> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("from ") {
        let Some((module, names)) = rest.split_once(" import ") else {
            return Vec::new();
        };
        let module = module.trim().to_string();
        names
            .split(',')
            .filter_map(|part| {
                let part = part.trim().trim_matches(|c| c == '(' || c == ')');
                if part.is_empty() {
                    return None;
                }
                let (original, bound) = match part.split_once(" as ") {
                    Some((orig, alias)) => (orig.trim(), alias.trim()),
                    None => (part.trim(), part.trim()),
                };
                if bound.is_empty() {
                    None
                } else {
                    Some((bound.to_string(), module.clone(), original.to_string()))
                }
            })
            .collect()
    } else if let Some(rest) = trimmed.strip_prefix("import ") {
        rest.split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let (module_part, alias) = match part.split_once(" as ") {
                    Some((m, a)) => (m.trim(), Some(a.trim())),
                    None => (part, None),
                };
                let bound = alias
                    .unwrap_or_else(|| module_part.split('.').next().unwrap_or(module_part))
                    .to_string();
                if bound.is_empty() {
                    None
                } else {
                    Some((bound, module_part.to_string(), module_part.to_string()))
                }
            })
            .collect()
    } else {
        Vec::new()
    }
}
