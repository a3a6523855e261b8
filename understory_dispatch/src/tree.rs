// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decision tree arena: nodes addressed by index, walked against a subject.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;

use crate::pattern::Check;
use crate::store::PossibilityId;
use crate::value::{AttrPath, Subject, Value, resolve};

/// Index of a node in the arena of one build generation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeIdx(u32);

impl NodeIdx {
    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Attribute test with one child per outcome.
#[derive(Clone, Debug)]
pub(crate) struct Branch {
    pub(crate) path: AttrPath,
    /// Taken when the path does not resolve.
    pub(crate) missing: Option<NodeIdx>,
    /// Taken when the path resolves to a value with no entry in `values`.
    pub(crate) wild: Option<NodeIdx>,
    pub(crate) values: HashMap<Value, NodeIdx>,
}

impl Branch {
    /// Child for an already-resolved value, `None` meaning no match.
    pub(crate) fn select(&self, value: Option<&Value>) -> Option<NodeIdx> {
        match value {
            None => self.missing,
            Some(v) => self.values.get(v).copied().or(self.wild),
        }
    }
}

/// A residual pattern in a check list.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub(crate) residual: Vec<Check>,
    pub(crate) possibility: PossibilityId,
}

impl Entry {
    pub(crate) fn matches<S: Subject + ?Sized>(&self, subject: &S) -> bool {
        self.residual.iter().all(|c| c.matches(subject))
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Node {
    Branch(Branch),
    /// Ordered best-first; the first matching entry wins.
    CheckList(Vec<Entry>),
    Result(PossibilityId),
}

/// Node counts for one compiled tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of branch nodes.
    pub branches: usize,
    /// Number of check-list nodes.
    pub check_lists: usize,
    /// Number of result nodes.
    pub results: usize,
    /// Longest root-to-leaf path, counted in nodes. Zero for an empty tree.
    pub depth: usize,
}

impl TreeStats {
    /// Total number of nodes.
    pub fn nodes(&self) -> usize {
        self.branches + self.check_lists + self.results
    }
}

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

/// One build generation's compiled tree.
///
/// Every tree carries a stamp unique within the process, so state derived from one tree
/// is never mistaken for state of another, whichever space built it.
#[derive(Clone, Debug)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeIdx>,
    stamp: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            stamp: NEXT_STAMP.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeIdx {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeIdx uses 32-bit indices."
        )]
        let idx = NodeIdx(self.nodes.len() as u32);
        self.nodes.push(node);
        idx
    }

    pub(crate) fn set_root(&mut self, root: Option<NodeIdx>) {
        self.root = root;
    }

    pub(crate) fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    pub(crate) fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.idx()]
    }

    pub(crate) fn get(&self, idx: NodeIdx) -> Option<&Node> {
        self.nodes.get(idx.idx())
    }

    /// Walk from `from` to the winning possibility for `subject`.
    ///
    /// An index outside the arena is no match.
    pub(crate) fn walk<S: Subject + ?Sized>(
        &self,
        from: NodeIdx,
        subject: &S,
    ) -> Option<PossibilityId> {
        let mut cur = from;
        loop {
            match self.get(cur)? {
                Node::Result(id) => return Some(*id),
                Node::CheckList(entries) => {
                    return entries
                        .iter()
                        .find(|e| e.matches(subject))
                        .map(|e| e.possibility);
                }
                Node::Branch(b) => {
                    let value = resolve(subject, &b.path);
                    tracing::trace!(path = %b.path, present = value.is_some(), "branch");
                    cur = b.select(value)?;
                }
            }
        }
    }

    pub(crate) fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for n in &self.nodes {
            match n {
                Node::Branch(_) => stats.branches += 1,
                Node::CheckList(_) => stats.check_lists += 1,
                Node::Result(_) => stats.results += 1,
            }
        }
        stats.depth = self.root.map_or(0, |r| self.depth(r));
        stats
    }

    fn depth(&self, idx: NodeIdx) -> usize {
        match self.node(idx) {
            Node::Branch(b) => {
                let below = b
                    .missing
                    .iter()
                    .chain(b.wild.iter())
                    .chain(b.values.values())
                    .map(|c| self.depth(*c))
                    .max()
                    .unwrap_or(0);
                below + 1
            }
            Node::CheckList(_) | Node::Result(_) => 1,
        }
    }
}
