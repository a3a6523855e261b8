// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Partial evaluation: dispatchers pre-advanced past attributes that are already known.
//!
//! ## Overview
//!
//! Many subjects often share part of their shape, e.g. every row of a list has the same
//! `kind`. [`DecisionSpace::partial_evaluate`](crate::DecisionSpace::partial_evaluate)
//! walks the tree once with those *known* attributes and returns a [`Partial`] pinned to
//! the first node that still needs input. Each subsequent
//! [`DecisionSpace::evaluate_partial`](crate::DecisionSpace::evaluate_partial) resumes there.
//!
//! ## Known and absent attributes
//!
//! - A top-level attribute in the known record is known *entirely*: every path starting with
//!   it resolves from the known record, and paths that do not resolve there are missing.
//! - An [`Absent`] set lists paths guaranteed never to be present on later subjects. A path
//!   is absent when it or one of its ancestors is listed.
//! - Everything else is unknown and stops the pre-walk, unless every outcome of that
//!   attribute leads to the same possibility anyway.
//!
//! The remainder passed to `evaluate_partial` must not repeat top-level known attributes,
//! nor provide absent ones; known attributes shadow the remainder's.

use alloc::vec::Vec;

use crate::store::PossibilityId;
use crate::tree::{Branch, Entry, Node, NodeIdx, Tree};
use crate::value::{AttrPath, Record, Subject, Value};

/// Attribute paths guaranteed absent from every subject a [`Partial`] will see.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Absent {
    paths: Vec<AttrPath>,
}

impl Absent {
    /// An empty set: nothing is guaranteed absent.
    pub fn new() -> Self {
        Self { paths: Vec::new() }
    }

    /// Builder form of [`Absent::insert`].
    #[must_use]
    pub fn with(mut self, path: impl Into<AttrPath>) -> Self {
        self.insert(path);
        self
    }

    /// Declare `path` (and everything below it) absent.
    pub fn insert(&mut self, path: impl Into<AttrPath>) {
        self.paths.push(path.into());
    }

    /// True if `path` or one of its ancestors was declared absent.
    pub fn covers(&self, path: &AttrPath) -> bool {
        self.paths.iter().any(|p| p.is_prefix_of(path))
    }

    /// True if nothing was declared absent.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<P: Into<AttrPath>> FromIterator<P> for Absent {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Where a partial resumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Residual {
    /// No subject can match.
    NoMatch,
    /// Every subject gets this possibility.
    Resolved(PossibilityId),
    /// Resume the walk at this node.
    Node(NodeIdx),
    /// Resume in a check list, trying only the listed entries (indices into the node's entries).
    Checks { node: NodeIdx, entries: Vec<usize> },
}

/// A dispatcher pre-advanced with known attributes.
///
/// Produced by [`DecisionSpace::partial_evaluate`](crate::DecisionSpace::partial_evaluate)
/// and valid only for the tree that produced it. A partial owns no reference into the tree,
/// so rebuilding never leaves it dangling. Using it after a rebuild, or with another
/// space, yields [`DispatchError::StalePartial`](crate::DispatchError::StalePartial).
#[derive(Clone, Debug)]
pub struct Partial {
    pub(crate) stamp: u64,
    pub(crate) generation: u32,
    pub(crate) known: Record,
    pub(crate) residual: Residual,
}

impl Partial {
    /// Build generation this partial belongs to.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The known attributes it was derived from.
    pub fn known(&self) -> &Record {
        &self.known
    }

    /// True if every subject sharing the known attributes gets the same possibility.
    pub fn is_resolved(&self) -> bool {
        matches!(self.residual, Residual::Resolved(_))
    }

    /// The possibility every subject gets, when [resolved](Self::is_resolved).
    pub fn resolved_id(&self) -> Option<PossibilityId> {
        match self.residual {
            Residual::Resolved(id) => Some(id),
            _ => None,
        }
    }

    /// True if no subject sharing the known attributes can match.
    pub fn is_exhausted(&self) -> bool {
        self.residual == Residual::NoMatch
    }

    /// Resume from the residual with the remainder of a subject.
    pub(crate) fn walk<S: Subject + ?Sized>(&self, tree: &Tree, rest: &S) -> Option<PossibilityId> {
        let subject = Overlay {
            known: &self.known,
            rest,
        };
        match &self.residual {
            Residual::NoMatch => None,
            Residual::Resolved(id) => Some(*id),
            Residual::Node(idx) => tree.walk(*idx, &subject),
            Residual::Checks { node, entries } => {
                let Some(Node::CheckList(list)) = tree.get(*node) else {
                    return None;
                };
                entries
                    .iter()
                    .filter_map(|&i| list.get(i))
                    .find(|e| e.matches(&subject))
                    .map(|e| e.possibility)
            }
        }
    }
}

/// Known attributes layered over the rest of a subject.
struct Overlay<'a, S: ?Sized> {
    known: &'a Record,
    rest: &'a S,
}

impl<S: Subject + ?Sized> Subject for Overlay<'_, S> {
    fn attr(&self, name: &str) -> Option<&Value> {
        match self.known.get(name) {
            Some(v) => Some(v),
            None => self.rest.attr(name),
        }
    }
}

enum Lookup<'a> {
    Known(Option<&'a Value>),
    Unknown,
}

fn lookup<'a>(known: &'a Record, absent: &Absent, path: &AttrPath) -> Lookup<'a> {
    let Some((first, rest)) = path.segments().split_first() else {
        return Lookup::Unknown;
    };
    if let Some(v) = known.get(first) {
        Lookup::Known(v.resolve(rest))
    } else if absent.covers(path) {
        Lookup::Known(None)
    } else {
        Lookup::Unknown
    }
}

/// Walk from the root as far as `known` and `absent` allow.
pub(crate) fn prewalk(tree: &Tree, known: &Record, absent: &Absent) -> Residual {
    match tree.root() {
        Some(root) => prewalk_from(tree, root, known, absent),
        None => Residual::NoMatch,
    }
}

fn prewalk_from(tree: &Tree, from: NodeIdx, known: &Record, absent: &Absent) -> Residual {
    let mut cur = from;
    loop {
        match tree.node(cur) {
            Node::Result(id) => return Residual::Resolved(*id),
            Node::Branch(b) => match lookup(known, absent, &b.path) {
                Lookup::Known(value) => match b.select(value) {
                    Some(next) => cur = next,
                    None => return Residual::NoMatch,
                },
                Lookup::Unknown => {
                    return match agreed(tree, b, known, absent) {
                        Some(id) => Residual::Resolved(id),
                        None => Residual::Node(cur),
                    };
                }
            },
            Node::CheckList(list) => return narrow_checks(cur, list, known, absent),
        }
    }
}

/// The possibility every arm of an undecided branch resolves to, if they all agree.
///
/// A missing `missing` or `wild` arm means some subjects match nothing, so the branch
/// cannot agree.
fn agreed(tree: &Tree, branch: &Branch, known: &Record, absent: &Absent) -> Option<PossibilityId> {
    let (Some(missing), Some(wild)) = (branch.missing, branch.wild) else {
        return None;
    };
    let resolve = |arm: NodeIdx| match prewalk_from(tree, arm, known, absent) {
        Residual::Resolved(id) => Some(id),
        _ => None,
    };
    let first = resolve(missing)?;
    branch
        .values
        .values()
        .copied()
        .chain([wild])
        .all(|arm| resolve(arm) == Some(first))
        .then_some(first)
}

fn narrow_checks(
    node: NodeIdx,
    list: &[Entry],
    known: &Record,
    absent: &Absent,
) -> Residual {
    let mut entries = Vec::new();
    for (i, entry) in list.iter().enumerate() {
        let mut decided = true;
        let mut viable = true;
        for check in &entry.residual {
            match lookup(known, absent, &check.path) {
                Lookup::Known(value) => viable &= check.test.accepts(value),
                Lookup::Unknown => decided = false,
            }
        }
        if !viable {
            continue;
        }
        if decided {
            // Entries are best-first; nothing after a certain match can win.
            if entries.is_empty() {
                return Residual::Resolved(entry.possibility);
            }
            entries.push(i);
            break;
        }
        entries.push(i);
    }
    if entries.is_empty() {
        Residual::NoMatch
    } else {
        Residual::Checks { node, entries }
    }
}
