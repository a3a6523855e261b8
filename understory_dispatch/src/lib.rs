// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_dispatch --heading-base-level=0

//! Understory Dispatch: structural pattern dispatch for picking widget implementations.
//!
//! ## Overview
//!
//! Register many *possibilities*, each a [`Pattern`] over the shape of a data object paired
//! with a result such as a widget factory. Then ask which result applies to a concrete object
//! (the *subject*). The most specific matching possibility wins.
//!
//! All patterns are compiled into one decision tree, so classification reads each attribute
//! at most once instead of testing every pattern in turn. This is the same problem a
//! pattern-match compiler solves for `match` arms.
//!
//! ## Patterns
//!
//! - A concrete value: the attribute must equal it (records compare deeply, handles by identity).
//! - [`WILD`]: the attribute must be present, with any value.
//! - A nested [`Pattern`]: the attribute must be a record matching it.
//! - Attributes a pattern does not mention are unconstrained, present or not.
//!
//! ## Precedence
//!
//! - A possibility constraining more attributes beats one constraining fewer.
//! - Among equally specific ones, the one demanding more concrete values wins, so `{a: 1}`
//!   beats `{a: WILD}` whichever was registered first.
//! - Among equally specific ones, the one decided by higher-priority attributes wins.
//!   Priority is the order given to [`DecisionSpace::with_priority`], or discovery order.
//! - Remaining ties follow the [`TieBreakPolicy`]: newest registration by default.
//!
//! ## Workflow
//!
//! 1) Register possibilities with [`DecisionSpace::add_possibility`]; malformed patterns are
//!    rejected immediately.
//! 2) [`DecisionSpace::build`] compiles the tree. Call it again after adding more.
//! 3) [`DecisionSpace::evaluate`] classifies a subject. Anything implementing [`Subject`]
//!    works; [`Record`] is the built-in one.
//! 4) For many subjects sharing some attributes, [`DecisionSpace::partial_evaluate`] walks the
//!    shared part once and [`DecisionSpace::evaluate_partial`] finishes each subject.
//!    Partials are tied to one build generation and rejected after a rebuild.
//!
//! ## Example
//!
//! ```rust
//! use understory_dispatch::{Absent, DecisionSpace, Pattern, Record, WILD};
//!
//! let mut space = DecisionSpace::new();
//! space.add_possibility(Pattern::new().with("kind", "list"), "ListView").unwrap();
//! space
//!     .add_possibility(Pattern::new().with("kind", "list").with("header", WILD), "HeaderListView")
//!     .unwrap();
//! space
//!     .add_possibility(
//!         Pattern::new().with("kind", "list").with("style", Pattern::new().with("dense", true)),
//!         "DenseListView",
//!     )
//!     .unwrap();
//! space.build().unwrap();
//!
//! let plain = Record::new().with("kind", "list");
//! assert_eq!(space.evaluate(&plain), Some(&"ListView"));
//!
//! let with_header = Record::new().with("kind", "list").with("header", "Inbox");
//! assert_eq!(space.evaluate(&with_header), Some(&"HeaderListView"));
//!
//! // Every list shares `kind`; walk that part once.
//! let lists = space.partial_evaluate(&Record::new().with("kind", "list"), &Absent::new());
//! let dense = Record::new().with("style", Record::new().with("dense", true));
//! assert_eq!(space.evaluate_partial(&lists, &dense), Ok(Some(&"DenseListView")));
//!
//! // Rebuilding invalidates outstanding partials.
//! space.build().unwrap();
//! assert!(space.evaluate_partial(&lists, &dense).is_err());
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod build;
pub mod error;
pub mod partial;
pub mod pattern;
pub mod space;
pub mod store;
pub mod tree;
pub mod value;

pub use build::{BuildOptions, TieBreakPolicy};
pub use error::{BuildError, DispatchError, PatternError};
pub use partial::{Absent, Partial};
pub use pattern::{Constraint, Pattern, WILD};
pub use space::{BuildStats, DecisionSpace};
pub use store::{PatternStore, PossibilityId};
pub use tree::TreeStats;
pub use value::{AttrPath, Record, Subject, Value};
