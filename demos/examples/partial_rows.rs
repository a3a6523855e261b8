// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Partial evaluation for list rows.
//!
//! Every row of a list shares `kind` and `theme`. The shared part is walked once, then each
//! row only supplies what differs. Rebuilding the space invalidates the partial.
//!
//! Run:
//! - `cargo run -p understory_demos --example partial_rows`

use tracing_subscriber::EnvFilter;
use understory_dispatch::{Absent, DecisionSpace, Pattern, Record, WILD};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut space = DecisionSpace::new();
    space
        .add_possibility(Pattern::new().with("kind", "row"), "RowView")
        .unwrap();
    space
        .add_possibility(
            Pattern::new().with("kind", "row").with("icon", WILD),
            "IconRowView",
        )
        .unwrap();
    space
        .add_possibility(
            Pattern::new().with("kind", "row").with("theme", "dark"),
            "DarkRowView",
        )
        .unwrap();
    space
        .add_possibility(Pattern::new().with("kind", "cell"), "CellView")
        .unwrap();
    space.build().unwrap();

    let shared = Record::new().with("kind", "row").with("theme", "light");
    let partial = space.partial_evaluate(&shared, &Absent::new());
    println!(
        "== Partial over {:?}: resolved={} exhausted={} ==",
        partial.known(),
        partial.is_resolved(),
        partial.is_exhausted()
    );

    let rows = [
        Record::new().with("title", "Drafts"),
        Record::new().with("title", "Sent").with("icon", "paper-plane"),
        Record::new(),
    ];
    for (i, row) in rows.iter().enumerate() {
        let widget = space.evaluate_partial(&partial, row).unwrap();
        println!("  row {i}: {}", widget.copied().unwrap_or("<none>"));
    }

    // Promise that rows never carry an icon: the decision no longer depends on the rows.
    let iconless = space.partial_evaluate(&shared, &Absent::new().with("icon"));
    println!(
        "== Iconless rows resolve up front: {:?} ==",
        space.resolved(&iconless).unwrap()
    );

    space
        .add_possibility(
            Pattern::new().with("kind", "row").with("badge", WILD),
            "BadgeRowView",
        )
        .unwrap();
    space.build().unwrap();
    match space.evaluate_partial(&partial, &rows[0]) {
        Ok(_) => println!("  unexpectedly reused a stale partial"),
        Err(err) => println!("  after rebuild: {err}"),
    }
}
