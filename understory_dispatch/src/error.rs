// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! A subject that matches nothing is not an error; evaluation returns `None` for that.
//! Errors cover caller mistakes: malformed patterns, ambiguous possibility sets under
//! [`TieBreakPolicy::Reject`](crate::TieBreakPolicy::Reject), and stale partials.

use thiserror::Error;

use crate::store::PossibilityId;
use crate::value::AttrPath;

/// A pattern rejected by [`DecisionSpace::add_possibility`](crate::DecisionSpace::add_possibility).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PatternError {
    /// An attribute name is the empty string.
    #[error("empty attribute name under `{parent}`")]
    EmptyName {
        /// Path of the pattern level holding the empty name.
        parent: AttrPath,
    },
    /// The same attribute is constrained twice at one pattern level.
    #[error("attribute `{path}` is constrained more than once")]
    DuplicateAttribute {
        /// The repeated attribute.
        path: AttrPath,
    },
    /// A nested pattern with no constraints, which would demand a shape without testing one.
    #[error("nested pattern at `{path}` has no constraints")]
    EmptyNested {
        /// The attribute holding the empty pattern.
        path: AttrPath,
    },
}

/// Failure to compile the decision tree.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Two equally specific possibilities can match the same subject and the tie-break
    /// policy forbids picking one.
    #[error("possibilities {first} and {second} are equally specific and can match the same subject")]
    Conflict {
        /// The earlier registration.
        first: PossibilityId,
        /// The later registration.
        second: PossibilityId,
    },
}

/// Failure to evaluate against a [`Partial`](crate::Partial).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The partial was derived from a tree that has since been rebuilt, or from another space.
    #[error("partial from build generation {partial} does not belong to the current tree (generation {current})")]
    StalePartial {
        /// Generation the partial was derived from.
        partial: u32,
        /// Generation of the current tree.
        current: u32,
    },
}
