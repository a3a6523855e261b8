// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The decision space: register possibilities, build, evaluate.

use tracing::debug;

use crate::build::{BuildOptions, compile};
use crate::error::{BuildError, DispatchError, PatternError};
use crate::partial::{Absent, Partial, prewalk};
use crate::pattern::Pattern;
use crate::store::{PatternStore, PossibilityId};
use crate::tree::{Tree, TreeStats};
use crate::value::{AttrPath, Record, Subject};

/// Summary of one [`DecisionSpace::build`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildStats {
    /// Generation of the freshly built tree.
    pub generation: u32,
    /// Number of possibilities compiled.
    pub possibilities: usize,
    /// Shape of the compiled tree.
    pub tree: TreeStats,
}

/// A structural-pattern dispatcher.
///
/// ## Usage
///
/// - Construct with [`DecisionSpace::new`], or [`DecisionSpace::with_priority`] to fix the
///   order in which attributes are branched on.
/// - Optionally adjust [`BuildOptions`] with [`DecisionSpace::set_build_options`].
/// - Register possibilities with [`DecisionSpace::add_possibility`].
/// - Call [`DecisionSpace::build`]; repeat after adding more possibilities.
/// - Classify subjects with [`DecisionSpace::evaluate`], or derive a [`Partial`] with
///   [`DecisionSpace::partial_evaluate`] and resume it with [`DecisionSpace::evaluate_partial`].
///
/// Possibilities added after a build take effect at the next build. Each build starts a new
/// generation; partials from older generations, or from other spaces, are rejected.
pub struct DecisionSpace<R> {
    store: PatternStore<R>,
    options: BuildOptions,
    tree: Tree,
    generation: u32,
}

impl<R> core::fmt::Debug for DecisionSpace<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecisionSpace")
            .field("possibilities", &self.store.len())
            .field("priority", &self.store.priority())
            .field("options", &self.options)
            .field("generation", &self.generation)
            .field("tree", &self.tree.stats())
            .finish_non_exhaustive()
    }
}

impl<R> Default for DecisionSpace<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> DecisionSpace<R> {
    /// Create an empty space that branches on attributes in discovery order.
    pub fn new() -> Self {
        Self::from_store(PatternStore::new())
    }

    /// Create an empty space with an explicit branching priority, highest first.
    ///
    /// See [`PatternStore::with_priority`] for how entries cover paths.
    pub fn with_priority<I, P>(priority: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<AttrPath>,
    {
        Self::from_store(PatternStore::with_priority(priority))
    }

    fn from_store(store: PatternStore<R>) -> Self {
        Self {
            store,
            options: BuildOptions::default(),
            tree: Tree::new(),
            generation: 0,
        }
    }

    /// Set options for subsequent builds.
    pub fn set_build_options(&mut self, options: BuildOptions) {
        self.options = options;
    }

    /// Options used by the next build.
    pub fn build_options(&self) -> BuildOptions {
        self.options
    }

    /// Registered possibilities.
    pub fn store(&self) -> &PatternStore<R> {
        &self.store
    }

    /// Register a possibility. Malformed patterns are rejected here rather than at build time.
    pub fn add_possibility(
        &mut self,
        pattern: Pattern,
        result: R,
    ) -> Result<PossibilityId, PatternError> {
        self.store.add(pattern, result)
    }

    /// Current build generation; `0` until the first build.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Recompile the tree from every registered possibility.
    ///
    /// The new tree replaces the old one only once it is complete, and on failure the
    /// previous tree and generation stay in place.
    pub fn build(&mut self) -> Result<BuildStats, BuildError> {
        let tree = compile(&self.store, self.options)?;
        self.tree = tree;
        self.generation = self.generation.saturating_add(1);
        let stats = BuildStats {
            generation: self.generation,
            possibilities: self.store.len(),
            tree: self.tree.stats(),
        };
        debug!(
            generation = stats.generation,
            possibilities = stats.possibilities,
            nodes = stats.tree.nodes(),
            depth = stats.tree.depth,
            "built decision tree"
        );
        Ok(stats)
    }

    /// The winning possibility for `subject`, if any.
    pub fn evaluate_id<S: Subject + ?Sized>(&self, subject: &S) -> Option<PossibilityId> {
        self.tree.walk(self.tree.root()?, subject)
    }

    /// The result of the most specific possibility matching `subject`, if any.
    pub fn evaluate<S: Subject + ?Sized>(&self, subject: &S) -> Option<&R> {
        self.evaluate_id(subject).and_then(|id| self.store.result(id))
    }

    /// Pre-advance the tree with attributes shared by many subjects.
    ///
    /// `known` holds top-level attributes whose values are fixed; `absent` lists paths that
    /// later subjects will never have. See the [`partial`](crate::partial) module docs.
    pub fn partial_evaluate(&self, known: &Record, absent: &Absent) -> Partial {
        let residual = prewalk(&self.tree, known, absent);
        debug!(generation = self.generation, residual = ?residual, "partial evaluation");
        Partial {
            stamp: self.tree.stamp(),
            generation: self.generation,
            known: known.clone(),
            residual,
        }
    }

    /// Finish a partial evaluation with the rest of a subject.
    ///
    /// Equivalent to [`DecisionSpace::evaluate`] on the known attributes merged with `rest`.
    pub fn evaluate_partial<S: Subject + ?Sized>(
        &self,
        partial: &Partial,
        rest: &S,
    ) -> Result<Option<&R>, DispatchError> {
        self.check_fresh(partial)?;
        Ok(partial
            .walk(&self.tree, rest)
            .and_then(|id| self.store.result(id)))
    }

    /// The result a [resolved](Partial::is_resolved) partial stands for.
    pub fn resolved(&self, partial: &Partial) -> Result<Option<&R>, DispatchError> {
        self.check_fresh(partial)?;
        Ok(partial.resolved_id().and_then(|id| self.store.result(id)))
    }

    /// True if `partial` was derived from the current tree of this space.
    ///
    /// Trees are told apart by a process-wide stamp rather than the generation number, so
    /// partials from another space never pass, and neither do old ones once the generation
    /// counter saturates.
    pub fn is_current(&self, partial: &Partial) -> bool {
        partial.stamp == self.tree.stamp()
    }

    fn check_fresh(&self, partial: &Partial) -> Result<(), DispatchError> {
        if self.is_current(partial) {
            Ok(())
        } else {
            Err(DispatchError::StalePartial {
                partial: partial.generation,
                current: self.generation,
            })
        }
    }
}
