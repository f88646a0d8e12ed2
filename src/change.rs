//! Tagged `Added` / `Deleted` / `Modified` variant shared by every component that needs to
//! describe "what happened to this value across one commit" without resorting to `Option`
//! pairs or sentinel values.

use serde::{Deserialize, Serialize};

/// A value that was added, deleted, or modified across an edit.
///
/// Every site that matches on a `Change` must handle all three cases; there is no default
/// case to fall back to, which is the point — an exhaustive tagged union checked at compile
/// time, rather than an `isinstance`-style dispatch checked at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change<T> {
    Added(T),
    Deleted(T),
    Modified(T, T),
}

impl<T> Change<T> {
    /// Wraps an unchanged value as a `Modified(x, x)`, the standard way to present
    /// "context" values that didn't themselves change alongside real edits.
    pub fn from_unchanged(value: T) -> Self
    where
        T: Clone,
    {
        Change::Modified(value.clone(), value)
    }

    /// The pre-edit value: `before` for `Modified`, the sole value for `Added`/`Deleted`.
    ///
    /// For `Added`, there is no real "before"; by convention we return the post-edit value
    /// so that callers that only need *some* representative value (e.g. for display or for
    /// seeding an unchanged-context fragment) don't need a separate branch.
    pub fn earlier(&self) -> &T {
        match self {
            Change::Added(after) => after,
            Change::Deleted(before) => before,
            Change::Modified(before, _after) => before,
        }
    }

    /// The post-edit value: `after` for `Modified`, the sole value for `Added`/`Deleted`.
    pub fn later(&self) -> &T {
        match self {
            Change::Added(after) => after,
            Change::Deleted(before) => before,
            Change::Modified(_before, after) => after,
        }
    }

    /// One-letter tag: `A`/`D`/`M`.
    pub fn as_char(&self) -> char {
        match self {
            Change::Added(_) => 'A',
            Change::Deleted(_) => 'D',
            Change::Modified(_, _) => 'M',
        }
    }

    /// Applies `f` to both sides where present, preserving the variant.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Change<U> {
        match self {
            Change::Added(after) => Change::Added(f(after)),
            Change::Deleted(before) => Change::Deleted(f(before)),
            Change::Modified(before, after) => Change::Modified(f(before), f(after)),
        }
    }

    /// Like [`Change::map`], but consumes `self` and the mapping function owns its inputs.
    pub fn map_owned<U>(self, mut f: impl FnMut(T) -> U) -> Change<U> {
        match self {
            Change::Added(after) => Change::Added(f(after)),
            Change::Deleted(before) => Change::Deleted(f(before)),
            Change::Modified(before, after) => Change::Modified(f(before), f(after)),
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Change::Added(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Change::Deleted(_))
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, Change::Modified(_, _))
    }
}
