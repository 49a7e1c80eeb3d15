// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_property` notification.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::cell::Cell;
use std::rc::Rc;

use understory_property::{Property, PropertyOptions, ReentrantPolicy, multilink};

fn counting_property(listeners: usize) -> (Property<u64>, Rc<Cell<u64>>) {
    let property = Property::new(0_u64);
    let hits = Rc::new(Cell::new(0_u64));
    for _ in 0..listeners {
        let hits = Rc::clone(&hits);
        property.lazy_link(move |new, _| hits.set(hits.get().wrapping_add(*new)));
    }
    (property, hits)
}

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("property/set");

    for listeners in [0_usize, 1, 4, 16, 64] {
        group.bench_function(BenchmarkId::new("fan_out", listeners), |b| {
            let (property, hits) = counting_property(listeners);
            let mut next = 0_u64;
            b.iter(|| {
                next += 1;
                property.set(black_box(next)).unwrap();
            });
            black_box(hits.get());
        });
    }

    group.bench_function("equal_write", |b| {
        let (property, _hits) = counting_property(4);
        property.set(7).unwrap();
        b.iter(|| property.set(black_box(7)).unwrap());
    });

    group.bench_function("deferred_coalesce/32_writes", |b| {
        let (property, _hits) = counting_property(4);
        let mut base = 0_u64;
        b.iter(|| {
            let _ = property.set_deferred(true);
            for i in 0..32 {
                property.set(base + i).unwrap();
            }
            base += 64;
            if let Some(notifier) = property.set_deferred(false) {
                notifier.notify();
            }
        });
    });

    group.finish();
}

fn bench_reentrant(c: &mut Criterion) {
    let mut group = c.benchmark_group("property/reentrant");

    for policy in [ReentrantPolicy::Queue, ReentrantPolicy::Stack] {
        group.bench_function(format!("increment_to_64/{policy:?}"), |b| {
            b.iter_batched(
                || {
                    let options = PropertyOptions::builder().reentrant(policy).build().unwrap();
                    let property = Property::with_options(1_u32, options).unwrap();
                    let writer = property.downgrade();
                    property.lazy_link(move |new, _| {
                        if *new < 64 {
                            if let Some(p) = writer.upgrade() {
                                p.set(new + 1).unwrap();
                            }
                        }
                    });
                    property
                },
                |property| {
                    property.set(2).unwrap();
                    black_box(property.value());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_multilink(c: &mut Criterion) {
    let mut group = c.benchmark_group("property/multilink");

    for sources in [2_usize, 8, 32] {
        group.bench_function(BenchmarkId::new("vec_sum", sources), |b| {
            let cells: Vec<Property<u64>> = (0..sources as u64).map(Property::new).collect();
            let total = Rc::new(Cell::new(0));
            let sink = Rc::clone(&total);
            let _link = multilink(cells.clone(), move |values| sink.set(values.iter().sum()));
            let mut next = 0_u64;
            b.iter(|| {
                next += 1;
                cells[0].set(black_box(next)).unwrap();
            });
            black_box(total.get());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_set, bench_reentrant, bench_multilink);
criterion_main!(benches);
