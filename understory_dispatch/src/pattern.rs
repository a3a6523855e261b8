// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Patterns: constraints over the shape of a subject.
//!
//! ## Overview
//!
//! A [`Pattern`] maps attribute names to [`Constraint`]s:
//!
//! - [`Constraint::Equals`]: the attribute must equal a concrete [`Value`].
//! - [`Constraint::Wild`] (also available as [`WILD`]): the attribute must be present, with any value.
//! - [`Constraint::Nested`]: the attribute must be a record matching a sub-pattern.
//!
//! Attributes a pattern does not mention are unconstrained: the attribute may be absent or
//! hold anything. Note the difference from [`WILD`], which fails subjects lacking the attribute.
//!
//! Internally a pattern is flattened into one [`Check`] per leaf constraint, keyed by its
//! full [`AttrPath`]. The number of checks is the pattern's specificity.

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::PatternError;
use crate::value::{AttrPath, Record, Subject, Value};

/// One constraint inside a [`Pattern`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    /// The attribute must equal this value.
    Equals(Value),
    /// The attribute must be present; any value satisfies it.
    Wild,
    /// The attribute must be a record matching this pattern.
    Nested(Pattern),
}

/// Presence-only constraint: "the attribute must exist, any value".
pub const WILD: Constraint = Constraint::Wild;

impl From<Value> for Constraint {
    fn from(v: Value) -> Self {
        Self::Equals(v)
    }
}

macro_rules! equals_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Constraint {
                fn from(v: $t) -> Self {
                    Self::Equals(Value::from(v))
                }
            }
        )*
    };
}

equals_from!(bool, i32, i64, f64, &str, String, Record);

impl From<Pattern> for Constraint {
    fn from(p: Pattern) -> Self {
        Self::Nested(p)
    }
}

/// An insertion-ordered set of attribute constraints.
///
/// ```
/// use understory_dispatch::{Pattern, WILD};
///
/// // Matches subjects with `kind == "list"`, any `items`, and `style.dense == true`.
/// let p = Pattern::new()
///     .with("kind", "list")
///     .with("items", WILD)
///     .with("style", Pattern::new().with("dense", true));
/// assert_eq!(p.len(), 3);
/// assert_eq!(p.specificity(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    attrs: Vec<(String, Constraint)>,
}

impl Pattern {
    /// Create an empty pattern, which matches every subject.
    pub fn new() -> Self {
        Self { attrs: Vec::new() }
    }

    /// Builder form of [`Pattern::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.insert(name, constraint);
        self
    }

    /// Append a constraint.
    ///
    /// Duplicates are kept as written and rejected when the pattern is registered.
    pub fn insert(&mut self, name: impl Into<String>, constraint: impl Into<Constraint>) {
        self.attrs.push((name.into(), constraint.into()));
    }

    /// Look up the first constraint for `name`.
    pub fn get(&self, name: &str) -> Option<&Constraint> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Iterate over constraints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> + '_ {
        self.attrs.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Number of top-level constraints.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True if the pattern constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Number of leaf constraints, counting through nested patterns.
    pub fn specificity(&self) -> usize {
        self.attrs
            .iter()
            .map(|(_, c)| match c {
                Constraint::Nested(p) => p.specificity(),
                _ => 1,
            })
            .sum()
    }

    /// Test `subject` against this pattern directly, without a decision tree.
    pub fn matches<S: Subject + ?Sized>(&self, subject: &S) -> bool {
        self.attrs
            .iter()
            .all(|(name, c)| constraint_matches(c, subject.attr(name)))
    }

    /// Reject patterns that cannot be compiled unambiguously.
    pub fn validate(&self) -> Result<(), PatternError> {
        self.validate_at(&AttrPath::root())
    }

    fn validate_at(&self, at: &AttrPath) -> Result<(), PatternError> {
        for (i, (name, c)) in self.attrs.iter().enumerate() {
            if name.is_empty() {
                return Err(PatternError::EmptyName { parent: at.clone() });
            }
            let path = at.child(name);
            if self.attrs[..i].iter().any(|(n, _)| n == name) {
                return Err(PatternError::DuplicateAttribute { path });
            }
            if let Constraint::Nested(p) = c {
                if p.is_empty() {
                    return Err(PatternError::EmptyNested { path });
                }
                p.validate_at(&path)?;
            }
        }
        Ok(())
    }

    /// Flatten into leaf checks, depth-first in insertion order.
    pub(crate) fn flatten(&self) -> Vec<Check> {
        let mut out = Vec::new();
        self.flatten_into(&AttrPath::root(), &mut out);
        out
    }

    fn flatten_into(&self, at: &AttrPath, out: &mut Vec<Check>) {
        for (name, c) in &self.attrs {
            let path = at.child(name);
            match c {
                Constraint::Equals(v) => out.push(Check {
                    path,
                    test: Test::Equals(v.clone()),
                }),
                Constraint::Wild => out.push(Check {
                    path,
                    test: Test::Present,
                }),
                Constraint::Nested(p) => p.flatten_into(&path, out),
            }
        }
    }
}

fn constraint_matches(c: &Constraint, value: Option<&Value>) -> bool {
    match c {
        Constraint::Equals(expected) => value == Some(expected),
        Constraint::Wild => value.is_some(),
        Constraint::Nested(p) => value
            .and_then(Value::as_record)
            .is_some_and(|r: &Record| p.matches(r)),
    }
}

/// A leaf test at a single path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Test {
    Equals(Value),
    Present,
}

impl Test {
    pub(crate) fn accepts(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Equals(expected) => value == Some(expected),
            Self::Present => value.is_some(),
        }
    }
}

/// A flattened constraint: `test` applied to the subject's value at `path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Check {
    pub(crate) path: AttrPath,
    pub(crate) test: Test,
}

impl Check {
    pub(crate) fn matches<S: Subject + ?Sized>(&self, subject: &S) -> bool {
        self.test.accepts(crate::value::resolve(subject, &self.path))
    }
}

/// True if some subject could satisfy both check lists at once.
///
/// Checks on the same path must agree, and an `Equals` check on an ancestor path decides
/// every check below it.
pub(crate) fn jointly_satisfiable(a: &[Check], b: &[Check]) -> bool {
    a.iter()
        .all(|x| b.iter().all(|y| pair_compatible(x, y) && pair_compatible(y, x)))
}

fn pair_compatible(outer: &Check, inner: &Check) -> bool {
    if outer.path == inner.path {
        return match (&outer.test, &inner.test) {
            (Test::Equals(x), Test::Equals(y)) => x == y,
            _ => true,
        };
    }
    if !outer.path.is_strict_prefix_of(&inner.path) {
        return true;
    }
    match &outer.test {
        Test::Equals(v) => {
            let suffix = &inner.path.segments()[outer.path.len()..];
            inner.test.accepts(v.resolve(suffix))
        }
        Test::Present => true,
    }
}
