// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_dispatch::{
    Absent, BuildOptions, DecisionSpace, Pattern, Record, TieBreakPolicy, Value, WILD,
};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn below(&mut self, n: u64) -> i64 {
        (self.next_u64() % n) as i64
    }
    fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }
}

/// Widget-like patterns: a `kind` on each, plus some of `size`, `header`, and `style.dense`.
fn gen_patterns(count: usize, kinds: u64) -> Vec<Pattern> {
    let mut rng = Rng::new(0xD15_7A7C_0FFE_E123);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let mut p = Pattern::new().with("kind", rng.below(kinds));
        if rng.chance(40) {
            p.insert("size", rng.below(4));
        }
        if rng.chance(30) {
            p.insert("header", WILD);
        }
        if rng.chance(25) {
            p.insert("style", Pattern::new().with("dense", rng.chance(50)));
        }
        out.push(p);
    }
    out
}

fn gen_subjects(count: usize, kinds: u64) -> Vec<Record> {
    let mut rng = Rng::new(0x5EED_CAFE_BABE_0042);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let mut r = Record::new().with("kind", rng.below(kinds));
        if rng.chance(60) {
            r.insert("size", rng.below(4));
        }
        if rng.chance(50) {
            r.insert("header", "title");
        }
        if rng.chance(50) {
            r.insert("style", Record::new().with("dense", rng.chance(50)));
        }
        out.push(r);
    }
    out
}

fn space_for(patterns: &[Pattern], checklist_threshold: usize) -> DecisionSpace<usize> {
    let mut space = DecisionSpace::with_priority(["kind", "size"]);
    space.set_build_options(BuildOptions {
        tie_break: TieBreakPolicy::Newer,
        checklist_threshold,
    });
    for (i, p) in patterns.iter().enumerate() {
        space.add_possibility(p.clone(), i).unwrap();
    }
    space.build().unwrap();
    space
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &n in &[16_usize, 64, 256] {
        let patterns = gen_patterns(n, 8);
        group.throughput(Throughput::Elements(n as u64));
        for &threshold in &[0_usize, 4] {
            group.bench_function(format!("n{}_threshold{}", n, threshold), |b| {
                b.iter_batched(
                    || patterns.clone(),
                    |patterns| {
                        let space = space_for(&patterns, threshold);
                        black_box(space.generation());
                    },
                    BatchSize::SmallInput,
                )
            });
        }
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    let subjects = gen_subjects(1024, 8);
    group.throughput(Throughput::Elements(subjects.len() as u64));
    for &n in &[16_usize, 64, 256] {
        let patterns = gen_patterns(n, 8);
        let space = space_for(&patterns, 1);
        group.bench_function(format!("tree_n{}", n), |b| {
            b.iter(|| {
                let hits = subjects
                    .iter()
                    .filter_map(|s| space.evaluate(s))
                    .count();
                black_box(hits);
            })
        });
        // Baseline: test every pattern and keep the most specific match.
        group.bench_function(format!("linear_n{}", n), |b| {
            b.iter(|| {
                let hits = subjects
                    .iter()
                    .filter_map(|s| {
                        patterns
                            .iter()
                            .enumerate()
                            .filter(|(_, p)| p.matches(s))
                            .max_by_key(|(i, p)| (p.specificity(), *i))
                    })
                    .count();
                black_box(hits);
            })
        });
    }
    group.finish();
}

fn bench_partial(c: &mut Criterion) {
    let mut group = c.benchmark_group("partial");
    let patterns = gen_patterns(256, 8);
    let space = space_for(&patterns, 1);
    let known = Record::new().with("kind", 3).with("size", 1);
    let rows: Vec<Record> = gen_subjects(1024, 8)
        .into_iter()
        .map(|mut r| {
            r.remove("kind");
            r.remove("size");
            r
        })
        .collect();
    let full: Vec<Record> = rows
        .iter()
        .map(|r| {
            let mut f = r.clone();
            f.insert("kind", Value::Int(3));
            f.insert("size", Value::Int(1));
            f
        })
        .collect();
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("full", |b| {
        b.iter(|| {
            let hits = full.iter().filter_map(|s| space.evaluate(s)).count();
            black_box(hits);
        })
    });
    group.bench_function("partial_then_rest", |b| {
        b.iter(|| {
            let partial = space.partial_evaluate(&known, &Absent::new());
            let hits = rows
                .iter()
                .filter_map(|r| space.evaluate_partial(&partial, r).ok().flatten())
                .count();
            black_box(hits);
        })
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_evaluate, bench_partial);
criterion_main!(benches);
