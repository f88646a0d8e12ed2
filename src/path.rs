//! Path identifiers: dotted module names and project-relative scope paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered tuple of identifier segments naming a module, e.g. `pkg.sub.mod`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ModulePath(segments.into_iter().map(Into::into).collect())
    }

    pub fn from_dotted(name: &str) -> Self {
        ModulePath(name.split('.').map(String::from).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn as_dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_dotted())
    }
}

/// A `(module, inner)` pair: `inner` is a possibly-empty dotted path into nested scopes
/// inside `module` (e.g. `ClassName.method_name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectPath {
    pub module: ModulePath,
    pub inner: String,
}

impl ProjectPath {
    pub fn new(module: ModulePath, inner: impl Into<String>) -> Self {
        ProjectPath {
            module,
            inner: inner.into(),
        }
    }

    /// The module-level path: `inner` is empty.
    pub fn module_root(module: ModulePath) -> Self {
        ProjectPath {
            module,
            inner: String::new(),
        }
    }

    /// Returns a new `ProjectPath` with `segment` appended to `inner`.
    pub fn append(&self, segment: &str) -> Self {
        let inner = if self.inner.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", self.inner, segment)
        };
        ProjectPath {
            module: self.module.clone(),
            inner,
        }
    }

    /// Fully-qualified dotted name, e.g. `pkg.mod.ClassName.method_name`.
    pub fn full_name(&self) -> String {
        if self.inner.is_empty() {
            self.module.as_dotted()
        } else {
            format!("{}.{}", self.module.as_dotted(), self.inner)
        }
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_builds_dotted_inner_path() {
        let root = ProjectPath::module_root(ModulePath::from_dotted("pkg.mod"));
        let cls = root.append("Foo");
        let method = cls.append("bar");
        assert_eq!(method.full_name(), "pkg.mod.Foo.bar");
        assert_eq!(method.inner, "Foo.bar");
    }

    #[test]
    fn module_root_has_empty_inner() {
        let root = ProjectPath::module_root(ModulePath::from_dotted("a.b"));
        assert_eq!(root.inner, "");
        assert_eq!(root.full_name(), "a.b");
    }
}
