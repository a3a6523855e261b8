// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree compilation.
//!
//! ## Overview
//!
//! Compilation works on a candidate set, each candidate carrying the checks of its
//! pattern that the path from the root has not yet performed. At every node:
//!
//! 1. The best *satisfied* candidate (no remaining checks) matches every subject that
//!    reaches the node, so anything it outranks is pruned. If nothing outranks it, the
//!    node is a `Result`.
//! 2. Small candidate sets become a `CheckList` ordered best-first.
//! 3. Otherwise the node branches on the highest-priority path any candidate still checks.
//!
//! ## Precedence
//!
//! Candidates are ranked by:
//!
//! - specificity (number of leaf constraints), higher first;
//! - exactness (number of constraints demanding a concrete value), higher first, so a
//!   value beats [`WILD`](crate::WILD) on the same attribute;
//! - the point at which they settle in branch order (the rank of their last remaining path),
//!   earlier first, which is how attribute priority decides between equally specific
//!   possibilities;
//! - the [`TieBreakPolicy`].
//!
//! Branch order along any root-to-leaf path is strictly increasing in rank, so a
//! `CheckList` sorted by this precedence selects the same winner a fully expanded subtree
//! would.

use alloc::vec::Vec;
use core::cmp::Ordering;

use hashbrown::HashMap;

use crate::error::BuildError;
use crate::pattern::{Check, Test, jointly_satisfiable};
use crate::store::{PatternStore, Possibility, PossibilityId};
use crate::tree::{Branch, Entry, Node, NodeIdx, Tree};
use crate::value::{AttrPath, Value};

/// Policy for ordering possibilities that equal in specificity and exactness and settle at
/// the same point.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TieBreakPolicy {
    /// The most recently registered possibility wins.
    #[default]
    Newer,
    /// The earliest registered possibility wins.
    Older,
    /// Refuse to build when such a tie can occur for some subject.
    ///
    /// [`DecisionSpace::build`](crate::DecisionSpace::build) then fails with
    /// [`BuildError::Conflict`].
    Reject,
}

/// Options applied by [`DecisionSpace::build`](crate::DecisionSpace::build).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// How to order equally specific possibilities.
    pub tie_break: TieBreakPolicy,
    /// Candidate sets at most this large become a linear check list instead of branching.
    ///
    /// `0` expands the tree until every leaf is a result.
    pub checklist_threshold: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tie_break: TieBreakPolicy::Newer,
            checklist_threshold: 1,
        }
    }
}

#[derive(Clone, Debug)]
struct Candidate {
    id: u32,
    /// Indices into the possibility's checks.
    remaining: Vec<usize>,
}

impl Candidate {
    fn without(&self, check: usize) -> Self {
        Self {
            id: self.id,
            remaining: self
                .remaining
                .iter()
                .copied()
                .filter(|&i| i != check)
                .collect(),
        }
    }
}

/// Which child of a branch a bucket feeds.
enum Arm<'a> {
    Value(&'a Value),
    /// Present, with a value outside the branch's value set.
    Wild(&'a HashMap<Value, usize>),
    Missing,
}

impl Arm<'_> {
    fn admits(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Value(v) => value == Some(*v),
            Self::Wild(values) => value.is_some_and(|v| !values.contains_key(v)),
            Self::Missing => value.is_none(),
        }
    }
}

struct Compiler<'a, R> {
    possibilities: &'a [Possibility<R>],
    /// Branch rank of each check, parallel to `Possibility::checks`.
    ranks: Vec<Vec<u32>>,
    /// Number of `Equals` checks per possibility.
    exact: Vec<usize>,
    options: BuildOptions,
    tree: Tree,
}

/// Compile every possibility in `store` into a fresh tree.
pub(crate) fn compile<R>(store: &PatternStore<R>, options: BuildOptions) -> Result<Tree, BuildError> {
    let path_ranks = store.path_ranks();
    let possibilities = store.possibilities();
    let ranks = possibilities
        .iter()
        .map(|p| p.checks.iter().map(|c| path_ranks[&c.path]).collect())
        .collect();
    let exact = possibilities
        .iter()
        .map(|p| {
            p.checks
                .iter()
                .filter(|c| matches!(c.test, Test::Equals(_)))
                .count()
        })
        .collect();
    let mut compiler = Compiler {
        possibilities,
        ranks,
        exact,
        options,
        tree: Tree::new(),
    };
    #[allow(
        clippy::cast_possible_truncation,
        reason = "PossibilityId uses 32-bit indices."
    )]
    let candidates: Vec<Candidate> = possibilities
        .iter()
        .enumerate()
        .map(|(id, p)| Candidate {
            id: id as u32,
            remaining: (0..p.checks.len()).collect(),
        })
        .collect();
    if options.tie_break == TieBreakPolicy::Reject {
        compiler.find_conflict(&candidates)?;
    }
    let root = compiler.compile(candidates);
    compiler.tree.set_root(root);
    Ok(compiler.tree)
}

impl<R> Compiler<'_, R> {
    fn check(&self, id: u32, i: usize) -> &Check {
        &self.possibilities[id as usize].checks[i]
    }

    fn specificity(&self, id: u32) -> usize {
        self.possibilities[id as usize].checks.len()
    }

    /// Rank of the last path `c` still needs; `None` once it is satisfied.
    fn settles_at(&self, c: &Candidate) -> Option<u32> {
        c.remaining
            .iter()
            .map(|&i| self.ranks[c.id as usize][i])
            .max()
    }

    /// Specificity, then exactness. Fixed per possibility.
    fn weight(&self, id: u32) -> (usize, usize) {
        (self.specificity(id), self.exact[id as usize])
    }

    /// `Greater` means `a` wins over `b`.
    fn precedence(&self, a: &Candidate, b: &Candidate) -> Ordering {
        self.weight(a.id)
            .cmp(&self.weight(b.id))
            .then_with(|| self.settles_at(b).cmp(&self.settles_at(a)))
            .then_with(|| match self.options.tie_break {
                TieBreakPolicy::Older => b.id.cmp(&a.id),
                TieBreakPolicy::Newer | TieBreakPolicy::Reject => a.id.cmp(&b.id),
            })
    }

    /// Report the first pair that only the tie-break policy could separate.
    fn find_conflict(&self, all: &[Candidate]) -> Result<(), BuildError> {
        for (j, b) in all.iter().enumerate() {
            for a in &all[..j] {
                let pa = &self.possibilities[a.id as usize];
                let pb = &self.possibilities[b.id as usize];
                if self.weight(a.id) == self.weight(b.id)
                    && self.settles_at(a) == self.settles_at(b)
                    && jointly_satisfiable(&pa.checks, &pb.checks)
                {
                    return Err(BuildError::Conflict {
                        first: PossibilityId(a.id),
                        second: PossibilityId(b.id),
                    });
                }
            }
        }
        Ok(())
    }

    fn compile(&mut self, mut cands: Vec<Candidate>) -> Option<NodeIdx> {
        let best = cands
            .iter()
            .filter(|c| c.remaining.is_empty())
            .max_by(|a, b| self.precedence(a, b))
            .cloned();
        if let Some(best) = best {
            cands.retain(|c| self.precedence(c, &best) != Ordering::Less);
            if cands.len() == 1 {
                return Some(self.tree.push(Node::Result(PossibilityId(best.id))));
            }
        }
        if cands.is_empty() {
            return None;
        }
        cands.sort_by(|a, b| self.precedence(b, a));

        if cands.len() <= self.options.checklist_threshold {
            let entries = cands
                .iter()
                .map(|c| Entry {
                    residual: c
                        .remaining
                        .iter()
                        .map(|&i| self.check(c.id, i).clone())
                        .collect(),
                    possibility: PossibilityId(c.id),
                })
                .collect();
            return Some(self.tree.push(Node::CheckList(entries)));
        }

        // Some candidate is unsatisfied here, otherwise the best one would have won alone.
        let rank = cands
            .iter()
            .flat_map(|c| c.remaining.iter().map(|&i| self.ranks[c.id as usize][i]))
            .min()?;
        self.branch(cands, rank)
    }

    /// Index of the check `c` performs at `rank`, if any.
    fn check_at(&self, c: &Candidate, rank: u32) -> Option<usize> {
        c.remaining
            .iter()
            .copied()
            .find(|&i| self.ranks[c.id as usize][i] == rank)
    }

    fn branch(&mut self, cands: Vec<Candidate>, rank: u32) -> Option<NodeIdx> {
        let path = cands
            .iter()
            .find_map(|c| self.check_at(c, rank).map(|i| self.check(c.id, i).path.clone()))?;

        let mut slots: HashMap<Value, usize> = HashMap::new();
        let mut values: Vec<(Value, Vec<Candidate>)> = Vec::new();
        for c in &cands {
            if let Some(i) = self.check_at(c, rank)
                && let Test::Equals(v) = &self.check(c.id, i).test
                && !slots.contains_key(v)
            {
                slots.insert(v.clone(), values.len());
                values.push((v.clone(), Vec::new()));
            }
        }

        let mut wild = Vec::new();
        let mut missing = Vec::new();
        for c in cands {
            match self.check_at(&c, rank) {
                Some(i) => {
                    let rest = c.without(i);
                    match &self.check(c.id, i).test {
                        Test::Equals(v) => values[slots[v]].1.push(rest),
                        Test::Present => {
                            for (_, bucket) in &mut values {
                                bucket.push(rest.clone());
                            }
                            wild.push(rest);
                        }
                    }
                }
                None => {
                    for (_, bucket) in &mut values {
                        bucket.push(c.clone());
                    }
                    wild.push(c.clone());
                    missing.push(c);
                }
            }
        }

        let mut children = HashMap::with_capacity(values.len());
        for (v, bucket) in values {
            let bucket = self.refine(bucket, &path, &Arm::Value(&v));
            if let Some(child) = self.compile(bucket) {
                children.insert(v, child);
            }
        }
        let wild = self.refine(wild, &path, &Arm::Wild(&slots));
        let wild = self.compile(wild);
        let missing = self.refine(missing, &path, &Arm::Missing);
        let missing = self.compile(missing);

        tracing::trace!(path = %path, values = children.len(), "branch");
        Some(self.tree.push(Node::Branch(Branch {
            path,
            missing,
            wild,
            values: children,
        })))
    }

    /// Drop candidates that cannot match any subject taking `arm` at `path`.
    ///
    /// Only prunes; checks stay in place so that settle points are unaffected.
    fn refine(&self, bucket: Vec<Candidate>, path: &AttrPath, arm: &Arm<'_>) -> Vec<Candidate> {
        bucket
            .into_iter()
            .filter(|c| {
                c.remaining.iter().all(|&i| {
                    let check = self.check(c.id, i);
                    if path.is_strict_prefix_of(&check.path) {
                        let suffix = &check.path.segments()[path.len()..];
                        match arm {
                            Arm::Value(v) => check.test.accepts(v.resolve(suffix)),
                            Arm::Missing => false,
                            Arm::Wild(_) => true,
                        }
                    } else if check.path.is_strict_prefix_of(path) {
                        let suffix = &path.segments()[check.path.len()..];
                        match &check.test {
                            Test::Equals(outer) => arm.admits(outer.resolve(suffix)),
                            Test::Present => true,
                        }
                    } else {
                        true
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Pattern, WILD};
    use crate::value::Record;

    fn store(patterns: &[(Pattern, &'static str)]) -> PatternStore<&'static str> {
        let mut s = PatternStore::new();
        for (p, r) in patterns {
            s.add(p.clone(), *r).unwrap();
        }
        s
    }

    fn eval(tree: &Tree, s: &PatternStore<&'static str>, subject: &Record) -> Option<&'static str> {
        let id = tree.walk(tree.root()?, subject)?;
        s.result(id).copied()
    }

    #[test]
    fn single_possibility_is_a_check_list() {
        let s = store(&[(Pattern::new().with("a", 1), "a")]);
        let tree = compile(&s, BuildOptions::default()).unwrap();
        let stats = tree.stats();
        assert_eq!(stats.check_lists, 1);
        assert_eq!(stats.branches, 0);
        assert_eq!(eval(&tree, &s, &Record::new().with("a", 1)), Some("a"));
        assert_eq!(eval(&tree, &s, &Record::new().with("a", 2)), None);
    }

    #[test]
    fn empty_pattern_is_a_result() {
        let s = store(&[(Pattern::new(), "any")]);
        let tree = compile(&s, BuildOptions::default()).unwrap();
        assert_eq!(tree.stats().results, 1);
        assert_eq!(eval(&tree, &s, &Record::new()), Some("any"));
    }

    #[test]
    fn empty_store_has_no_root() {
        let s = store(&[]);
        let tree = compile(&s, BuildOptions::default()).unwrap();
        assert!(tree.root().is_none());
    }

    #[test]
    fn zero_threshold_expands_to_results() {
        let s = store(&[
            (Pattern::new().with("a", 1), "a"),
            (Pattern::new().with("b", 1), "b"),
            (Pattern::new().with("a", 1).with("b", 1), "ab"),
        ]);
        let options = BuildOptions {
            checklist_threshold: 0,
            ..BuildOptions::default()
        };
        let tree = compile(&s, options).unwrap();
        assert_eq!(tree.stats().check_lists, 0);
        assert_eq!(eval(&tree, &s, &Record::new().with("a", 1).with("b", 1)), Some("ab"));
        assert_eq!(eval(&tree, &s, &Record::new().with("a", 2).with("b", 1)), Some("b"));
        assert_eq!(eval(&tree, &s, &Record::new().with("a", 2).with("b", 2)), None);
    }

    #[test]
    fn thresholds_agree() {
        let s = store(&[
            (Pattern::new().with("a", 1), "a"),
            (Pattern::new().with("b", WILD), "b"),
            (Pattern::new().with("c", Pattern::new().with("d", 1)), "cd"),
            (Pattern::new().with("a", 1).with("c", WILD), "ac"),
            (Pattern::new().with("a", Record::new().with("d", 1)), "rec"),
        ]);
        let subjects = [
            Record::new().with("a", 1),
            Record::new().with("a", 1).with("b", 0).with("c", 0),
            Record::new().with("b", 0),
            Record::new().with("c", Record::new().with("d", 1)),
            Record::new().with("a", Record::new().with("d", 1)).with("b", 3),
            Record::new().with("a", 7),
            Record::new(),
        ];
        let trees: Vec<Tree> = [0, 1, 2, 8]
            .into_iter()
            .map(|checklist_threshold| {
                compile(
                    &s,
                    BuildOptions {
                        checklist_threshold,
                        ..BuildOptions::default()
                    },
                )
                .unwrap()
            })
            .collect();
        for subject in &subjects {
            let expected = eval(&trees[0], &s, subject);
            for tree in &trees[1..] {
                assert_eq!(eval(tree, &s, subject), expected, "subject {subject:?}");
            }
        }
    }

    #[test]
    fn nested_paths_are_pruned_statically() {
        let s = store(&[
            (Pattern::new().with("a", 1), "a"),
            (Pattern::new().with("a", Pattern::new().with("a", 1)), "aa"),
        ]);
        let tree = compile(&s, BuildOptions::default()).unwrap();
        let root = tree.root().unwrap();
        let Node::Branch(b) = tree.node(root) else {
            panic!("expected a branch at the root");
        };
        assert_eq!(b.path, AttrPath::from("a"));
        // `a.a` cannot resolve when `a` is missing or equal to 1.
        assert!(b.missing.is_none());
        assert!(matches!(
            tree.node(b.values[&Value::Int(1)]),
            Node::CheckList(entries) if entries.len() == 1
        ));
        assert_eq!(
            eval(&tree, &s, &Record::new().with("a", Record::new().with("a", 1))),
            Some("aa")
        );
    }

    #[test]
    fn tie_break_policies() {
        let patterns = [
            (Pattern::new().with("a", 1), "first"),
            (Pattern::new().with("a", 1), "second"),
        ];
        let s = store(&patterns);
        let subject = Record::new().with("a", 1);

        let newer = compile(&s, BuildOptions::default()).unwrap();
        assert_eq!(eval(&newer, &s, &subject), Some("second"));

        let older = compile(
            &s,
            BuildOptions {
                tie_break: TieBreakPolicy::Older,
                ..BuildOptions::default()
            },
        )
        .unwrap();
        assert_eq!(eval(&older, &s, &subject), Some("first"));

        let reject = compile(
            &s,
            BuildOptions {
                tie_break: TieBreakPolicy::Reject,
                ..BuildOptions::default()
            },
        );
        assert_eq!(
            reject.err(),
            Some(BuildError::Conflict {
                first: PossibilityId(0),
                second: PossibilityId(1),
            })
        );
    }

    #[test]
    fn value_outranks_wild_of_equal_specificity() {
        let value_first = store(&[
            (Pattern::new().with("a", 1), "one"),
            (Pattern::new().with("a", WILD), "wild"),
        ]);
        let wild_first = store(&[
            (Pattern::new().with("a", WILD), "wild"),
            (Pattern::new().with("a", 1), "one"),
        ]);
        for s in [&value_first, &wild_first] {
            for checklist_threshold in [0, 1, 4] {
                let tree = compile(
                    s,
                    BuildOptions {
                        checklist_threshold,
                        ..BuildOptions::default()
                    },
                )
                .unwrap();
                assert_eq!(eval(&tree, s, &Record::new().with("a", 1)), Some("one"));
                assert_eq!(eval(&tree, s, &Record::new().with("a", 2)), Some("wild"));
                assert_eq!(eval(&tree, s, &Record::new()), None);
            }
            // Only registration order could separate a true tie; this is not one.
            let options = BuildOptions {
                tie_break: TieBreakPolicy::Reject,
                ..BuildOptions::default()
            };
            assert!(compile(s, options).is_ok(), "value and wild are ordered");
        }
    }

    #[test]
    fn wild_pattern_with_more_checks_stays_reachable() {
        let s = store(&[
            (Pattern::new().with("a", 1), "one"),
            (Pattern::new().with("a", WILD).with("b", 1), "wild b"),
        ]);
        let tree = compile(&s, BuildOptions::default()).unwrap();
        assert_eq!(
            eval(&tree, &s, &Record::new().with("a", 1).with("b", 1)),
            Some("wild b")
        );
        assert_eq!(eval(&tree, &s, &Record::new().with("a", 1)), Some("one"));
    }

    #[test]
    fn reject_allows_disjoint_or_priority_ordered_ties() {
        let s = store(&[
            (Pattern::new().with("a", 1), "a1"),
            (Pattern::new().with("a", 2), "a2"),
            (Pattern::new().with("b", 1), "b"),
        ]);
        let options = BuildOptions {
            tie_break: TieBreakPolicy::Reject,
            ..BuildOptions::default()
        };
        let tree = compile(&s, options).unwrap();
        assert_eq!(eval(&tree, &s, &Record::new().with("a", 1).with("b", 1)), Some("a1"));
    }
}
