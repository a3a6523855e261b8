// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pattern store: registered possibilities and attribute priority.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::{HashMap, HashSet};

use crate::error::PatternError;
use crate::pattern::{Check, Pattern};
use crate::value::AttrPath;

/// Identifier for a registered possibility: its position in registration order.
///
/// Later registrations have larger ids. Ids stay valid across rebuilds since the store
/// is append-only.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PossibilityId(pub(crate) u32);

impl PossibilityId {
    /// Registration index, starting at zero.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PossibilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Possibility<R> {
    pub(crate) pattern: Pattern,
    pub(crate) result: R,
    pub(crate) checks: Vec<Check>,
}

/// Append-only list of `(pattern, result)` pairs plus the branching priority.
#[derive(Clone, Debug)]
pub struct PatternStore<R> {
    possibilities: Vec<Possibility<R>>,
    priority: Vec<AttrPath>,
}

impl<R> Default for PatternStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> PatternStore<R> {
    /// Create an empty store that branches in discovery order.
    pub fn new() -> Self {
        Self {
            possibilities: Vec::new(),
            priority: Vec::new(),
        }
    }

    /// Create an empty store with an explicit branching priority, highest first.
    ///
    /// An entry covers every path it is a prefix of, so `"a"` covers `a.b` as well.
    /// Paths covered by no entry rank after all covered ones.
    pub fn with_priority<I, P>(priority: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<AttrPath>,
    {
        Self {
            possibilities: Vec::new(),
            priority: priority.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate and append a possibility.
    pub fn add(&mut self, pattern: Pattern, result: R) -> Result<PossibilityId, PatternError> {
        pattern.validate()?;
        #[allow(
            clippy::cast_possible_truncation,
            reason = "PossibilityId uses 32-bit indices."
        )]
        let id = PossibilityId(self.possibilities.len() as u32);
        let checks = pattern.flatten();
        self.possibilities.push(Possibility {
            pattern,
            result,
            checks,
        });
        Ok(id)
    }

    /// Number of registered possibilities.
    pub fn len(&self) -> usize {
        self.possibilities.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.possibilities.is_empty()
    }

    /// The pattern and result registered under `id`.
    pub fn get(&self, id: PossibilityId) -> Option<(&Pattern, &R)> {
        self.possibilities
            .get(id.index())
            .map(|p| (&p.pattern, &p.result))
    }

    /// The result registered under `id`.
    pub fn result(&self, id: PossibilityId) -> Option<&R> {
        self.possibilities.get(id.index()).map(|p| &p.result)
    }

    /// The explicit priority list, possibly empty.
    pub fn priority(&self) -> &[AttrPath] {
        &self.priority
    }

    pub(crate) fn possibilities(&self) -> &[Possibility<R>] {
        &self.possibilities
    }

    /// Rank every path mentioned by any possibility; lower ranks are branched on first.
    ///
    /// Paths sort by the first priority entry covering them, then by discovery order.
    pub(crate) fn path_ranks(&self) -> HashMap<AttrPath, u32> {
        let mut discovered: Vec<&AttrPath> = Vec::new();
        let mut seen: HashSet<&AttrPath> = HashSet::new();
        for p in &self.possibilities {
            for c in &p.checks {
                if seen.insert(&c.path) {
                    discovered.push(&c.path);
                }
            }
        }
        // Stable sort keeps discovery order within one priority class.
        discovered.sort_by_key(|path| {
            self.priority
                .iter()
                .position(|entry| entry.is_prefix_of(path))
                .unwrap_or(usize::MAX)
        });
        discovered
            .into_iter()
            .enumerate()
            .map(|(rank, path)| {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "Path ranks are bounded by the number of checks, which fits in 32 bits."
                )]
                let rank = rank as u32;
                (path.clone(), rank)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::WILD;

    fn ranked(store: &PatternStore<&'static str>) -> Vec<AttrPath> {
        let ranks = store.path_ranks();
        let mut paths: Vec<_> = ranks.into_iter().collect();
        paths.sort_by_key(|(_, r)| *r);
        paths.into_iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn ids_follow_registration_order() {
        let mut store = PatternStore::new();
        let a = store.add(Pattern::new().with("a", 1), "a").unwrap();
        let b = store.add(Pattern::new().with("b", 1), "b").unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(a < b);
        assert_eq!(store.result(b), Some(&"b"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn malformed_patterns_are_not_stored() {
        let mut store = PatternStore::new();
        let err = store.add(Pattern::new().with("a", 1).with("a", 2), "bad");
        assert!(err.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn discovery_order_is_default_priority() {
        let mut store = PatternStore::new();
        store
            .add(Pattern::new().with("b", 1).with("a", WILD), "x")
            .unwrap();
        store
            .add(Pattern::new().with("c", Pattern::new().with("d", 1)).with("a", 2), "y")
            .unwrap();
        assert_eq!(
            ranked(&store),
            alloc::vec![
                AttrPath::from("b"),
                AttrPath::from("a"),
                AttrPath::from(["c", "d"]),
            ]
        );
    }

    #[test]
    fn explicit_priority_covers_nested_paths() {
        let mut store = PatternStore::with_priority(["c", "a"]);
        store.add(Pattern::new().with("b", 1).with("a", 1), "x").unwrap();
        store
            .add(Pattern::new().with("c", Pattern::new().with("d", 1)), "y")
            .unwrap();
        assert_eq!(
            ranked(&store),
            alloc::vec![
                AttrPath::from(["c", "d"]),
                AttrPath::from("a"),
                AttrPath::from("b"),
            ]
        );
    }
}
