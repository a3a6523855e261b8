// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Widget dispatch basics.
//!
//! Registers a handful of widget choices keyed on the shape of a data object, then shows
//! which one each object gets and why the more specific pattern wins.
//!
//! Run:
//! - `cargo run -p understory_demos --example widget_dispatch`
//! - `RUST_LOG=understory_dispatch=trace cargo run -p understory_demos --example widget_dispatch`

use tracing_subscriber::EnvFilter;
use understory_dispatch::{BuildOptions, DecisionSpace, Pattern, Record, TieBreakPolicy, WILD};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // `kind` decides first, then `header`.
    let mut space: DecisionSpace<&str> = DecisionSpace::with_priority(["kind", "header"]);
    space.set_build_options(BuildOptions {
        tie_break: TieBreakPolicy::Reject,
        ..BuildOptions::default()
    });

    space.add_possibility(Pattern::new(), "Placeholder").unwrap();
    space
        .add_possibility(Pattern::new().with("kind", "text"), "Label")
        .unwrap();
    space
        .add_possibility(
            Pattern::new().with("kind", "text").with("editable", true),
            "TextInput",
        )
        .unwrap();
    space
        .add_possibility(Pattern::new().with("kind", "list"), "ListView")
        .unwrap();
    space
        .add_possibility(
            Pattern::new().with("kind", "list").with("header", WILD),
            "HeaderListView",
        )
        .unwrap();
    space
        .add_possibility(
            Pattern::new()
                .with("kind", "list")
                .with("style", Pattern::new().with("dense", true)),
            "DenseListView",
        )
        .unwrap();

    let stats = space.build().unwrap();
    println!(
        "== Built generation {} from {} possibilities ({} nodes, depth {}) ==",
        stats.generation,
        stats.possibilities,
        stats.tree.nodes(),
        stats.tree.depth
    );

    let subjects = [
        ("empty object", Record::new()),
        ("plain text", Record::new().with("kind", "text")),
        (
            "editable text",
            Record::new().with("kind", "text").with("editable", true),
        ),
        (
            "read-only text",
            Record::new().with("kind", "text").with("editable", false),
        ),
        ("plain list", Record::new().with("kind", "list")),
        (
            "list with header",
            Record::new().with("kind", "list").with("header", "Inbox"),
        ),
        (
            "dense list",
            Record::new()
                .with("kind", "list")
                .with("style", Record::new().with("dense", true)),
        ),
        ("unknown kind", Record::new().with("kind", "chart")),
    ];
    for (label, subject) in &subjects {
        let id = space.evaluate_id(subject);
        let widget = space.evaluate(subject).copied().unwrap_or("<none>");
        match id {
            Some(id) => println!("  {label:<18} -> {widget} (possibility {id})"),
            None => println!("  {label:<18} -> {widget}"),
        }
    }

    // "list with header" and "dense list" are equally specific and could both match a
    // dense list with a header. Priority on `header` settles it, so Reject still builds.
    let both = Record::new()
        .with("kind", "list")
        .with("header", "Inbox")
        .with("style", Record::new().with("dense", true));
    println!(
        "  {:<18} -> {}",
        "dense with header",
        space.evaluate(&both).copied().unwrap_or("<none>")
    );
}
