//! Benchmarks for the resolution engine

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use wireplan::{Activatable, ArgBag, ClassSpec, Registry, Result};

struct Leaf;

impl Activatable for Leaf {
    fn blueprint() -> ClassSpec {
        ClassSpec::new("Leaf")
    }
    fn assemble(_bag: &mut ArgBag) -> Result<Self> {
        Ok(Leaf)
    }
}

#[allow(dead_code)]
struct Mid {
    leaf: Arc<Leaf>,
}

impl Activatable for Mid {
    fn blueprint() -> ClassSpec {
        ClassSpec::new("Mid").param::<Leaf>("leaf")
    }
    fn assemble(bag: &mut ArgBag) -> Result<Self> {
        Ok(Mid {
            leaf: bag.required::<Leaf>("leaf")?,
        })
    }
}

#[allow(dead_code)]
struct Root {
    left: Arc<Mid>,
    right: Arc<Mid>,
    leaf: Arc<Leaf>,
}

impl Activatable for Root {
    fn blueprint() -> ClassSpec {
        ClassSpec::new("Root")
            .param::<Mid>("left")
            .param::<Mid>("right")
            .param::<Leaf>("leaf")
    }
    fn assemble(bag: &mut ArgBag) -> Result<Self> {
        Ok(Root {
            left: bag.required::<Mid>("left")?,
            right: bag.required::<Mid>("right")?,
            leaf: bag.required::<Leaf>("leaf")?,
        })
    }
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("three_services", |b| {
        b.iter(|| {
            let mut registry = Registry::new();
            registry.add_singleton::<Leaf>().unwrap();
            registry.add_transient::<Mid>().unwrap();
            registry.add_transient::<Root>().unwrap();
            black_box(registry)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    group.bench_function("singleton_hit", |b| {
        let mut registry = Registry::new();
        registry.add_singleton::<Leaf>().unwrap();
        let provider = registry.build_provider();
        provider.get::<Leaf>().unwrap();

        b.iter(|| black_box(provider.get::<Leaf>().unwrap()))
    });

    group.bench_function("transient_graph", |b| {
        let mut registry = Registry::new();
        registry.add_singleton::<Leaf>().unwrap();
        registry.add_transient::<Mid>().unwrap();
        registry.add_transient::<Root>().unwrap();
        let provider = registry.build_provider();

        b.iter(|| black_box(provider.get::<Root>().unwrap()))
    });

    group.bench_function("scoped_within_scope", |b| {
        let mut registry = Registry::new();
        registry.add_scoped::<Leaf>().unwrap();
        let provider = registry.build_provider();

        b.iter(|| {
            let scope = provider.create_scope();
            let first = scope.get::<Leaf>().unwrap();
            let second = scope.get::<Leaf>().unwrap();
            black_box((first, second))
        })
    });

    group.finish();
}

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");

    group.bench_function("first_resolve_compiles_plan", |b| {
        b.iter(|| {
            let mut registry = Registry::new();
            registry.add_singleton::<Leaf>().unwrap();
            registry.add_transient::<Mid>().unwrap();
            registry.add_transient::<Root>().unwrap();
            let provider = registry.build_provider();
            black_box(provider.get::<Root>().unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_registration, bench_resolution, bench_planning);
criterion_main!(benches);
