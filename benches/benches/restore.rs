// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_state` restoration passes.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use understory_property::Property;
use understory_state::{ElementPath, Phase, Snapshot, StateEngine};

struct Fixture {
    engine: StateEngine,
    cells: Vec<Property<u64>>,
    paths: Vec<ElementPath>,
}

fn fixture(n: usize) -> Fixture {
    let engine = StateEngine::new();
    let root = ElementPath::new("sim");
    let mut cells = Vec::with_capacity(n);
    let mut paths = Vec::with_capacity(n);
    for i in 0..n {
        let path = root.child(&format!("cell{i:04}"));
        let cell = Property::new(0_u64);
        cell.lazy_link(|new, _| {
            black_box(new);
        });
        engine.instrument(path.clone(), &cell).unwrap();
        cells.push(cell);
        paths.push(path);
    }
    Fixture {
        engine,
        cells,
        paths,
    }
}

fn snapshot(paths: &[ElementPath], value: u64) -> Snapshot {
    paths
        .iter()
        .map(|path| (path.clone(), json!(value)))
        .collect()
}

fn bench_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("state/restore");

    for n in [16_usize, 128, 1024] {
        group.bench_function(BenchmarkId::new("independent", n), |b| {
            let fx = fixture(n);
            let mut value = 0_u64;
            b.iter_batched(
                || {
                    value += 1;
                    snapshot(&fx.paths, value)
                },
                |snap| black_box(fx.engine.apply_snapshot(&snap).unwrap()),
                BatchSize::SmallInput,
            );
            black_box(fx.cells[0].value());
        });

        // Each cell notifies only after its successor: a worst-case chain
        // that needs one drain iteration per element.
        group.bench_function(BenchmarkId::new("notify_chain", n), |b| {
            let fx = fixture(n);
            for pair in fx.paths.windows(2) {
                fx.engine
                    .register_dependency(pair[1].clone(), Phase::Notify, pair[0].clone(), Phase::Notify)
                    .unwrap();
            }
            let mut value = 0_u64;
            b.iter_batched(
                || {
                    value += 1;
                    snapshot(&fx.paths, value)
                },
                |snap| black_box(fx.engine.apply_snapshot(&snap).unwrap()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_dependencies(c: &mut Criterion) {
    let mut group = c.benchmark_group("state/dependencies");

    group.bench_function("register_then_unregister/1024", |b| {
        let fx = fixture(1024);
        b.iter(|| {
            for pair in fx.paths.windows(2) {
                fx.engine
                    .register_dependency(pair[0].clone(), Phase::Undefer, pair[1].clone(), Phase::Notify)
                    .unwrap();
            }
            for path in &fx.paths {
                fx.engine.unregister_all_dependencies_for(path);
            }
            black_box(fx.engine.count_dependencies());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_restore, bench_dependencies);
criterion_main!(benches);
