//! Benchmarks for binding and propagation.
//!
//! Performance budgets:
//! - bind two flat roots (6 members each): < 50us
//! - one state propagation across two members: < 2us
//! - rebind after replacing a nested object: < 20us
//!
//! Run with: cargo bench -p tether-runtime --bench propagation_bench

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use tether_core::{AnyLink, ObjectRef};
use tether_runtime::{Binder, Observable, Scanner, TableScanner, TypeTable};

struct Flat {
    alpha: Observable<i64>,
    bravo: Observable<i64>,
    charlie: Observable<i64>,
    delta: Observable<String>,
    echo: Observable<String>,
    foxtrot: Observable<bool>,
}

struct Parent {
    child: Observable<AnyLink>,
}

struct Child {
    value: Observable<i64>,
}

fn flat_scanner() -> Arc<dyn Scanner> {
    Arc::new(
        TableScanner::new().with(
            TypeTable::builder::<Flat>()
                .property("alpha", |f: &Flat| &f.alpha)
                .property("bravo", |f: &Flat| &f.bravo)
                .property("charlie", |f: &Flat| &f.charlie)
                .property("delta", |f: &Flat| &f.delta)
                .property("echo", |f: &Flat| &f.echo)
                .property("foxtrot", |f: &Flat| &f.foxtrot)
                .build(),
        ),
    )
}

fn flat() -> Arc<Flat> {
    Arc::new(Flat {
        alpha: Observable::new(0),
        bravo: Observable::new(1),
        charlie: Observable::new(2),
        delta: Observable::new(String::new()),
        echo: Observable::new("e".into()),
        foxtrot: Observable::new(false),
    })
}

fn nested_scanner() -> Arc<dyn Scanner> {
    Arc::new(
        TableScanner::new()
            .with(
                TypeTable::builder::<Parent>()
                    .property("child", |p: &Parent| &p.child)
                    .build(),
            )
            .with(
                TypeTable::builder::<Child>()
                    .property("value", |c: &Child| &c.value)
                    .build(),
            ),
    )
}

fn child(v: i64) -> Arc<Child> {
    Arc::new(Child {
        value: Observable::new(v),
    })
}

fn bench_bind(c: &mut Criterion) {
    let mut group = c.benchmark_group("binder/bind");
    let binder = Binder::new(flat_scanner());
    group.bench_function("flat_6x2", |b| {
        let roots: Vec<ObjectRef> = vec![flat() as ObjectRef, flat() as ObjectRef];
        b.iter(|| black_box(binder.bind(black_box(&roots))))
    });
    group.finish();
}

fn bench_propagate(c: &mut Criterion) {
    let mut group = c.benchmark_group("valve/propagate");
    let binder = Binder::new(flat_scanner());
    let (a, b_root) = (flat(), flat());
    let bindings = binder.bind(&[a.clone(), b_root.clone()]);
    group.bench_function("state_two_members", |b| {
        let mut v = 0_i64;
        b.iter(|| {
            v += 1;
            a.alpha.set(black_box(v));
        })
    });
    drop(bindings);
    group.finish();
}

fn bench_rebind(c: &mut Criterion) {
    let mut group = c.benchmark_group("valve/rebind");
    let binder = Binder::new(nested_scanner());
    let left = Arc::new(Parent {
        child: Observable::new(AnyLink::new(child(0))),
    });
    let right = Arc::new(Parent {
        child: Observable::new(AnyLink::new(child(0))),
    });
    let bindings = binder.bind(&[left.clone(), right.clone()]);
    group.bench_function("replace_child", |b| {
        let mut v = 0_i64;
        b.iter(|| {
            v += 1;
            left.child.set(AnyLink::new(child(black_box(v))));
        })
    });
    drop(bindings);
    group.finish();
}

criterion_group!(benches, bench_bind, bench_propagate, bench_rebind);
criterion_main!(benches);
