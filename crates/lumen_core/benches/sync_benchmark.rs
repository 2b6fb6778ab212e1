//! # Deferred Commit Benchmark
//!
//! Measures request enqueue + commit throughput of the manager, and the
//! cost of typed reads against a committed store.

#![allow(missing_docs)]

use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use lumen_core::{Component, EntityComponentManager, Tag};

const ENTITY_COUNT: u64 = 10_000;

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy)]
struct Velocity {
    dx: f32,
}
impl Component for Velocity {}

fn populated() -> (EntityComponentManager, Vec<Tag>) {
    let mut ecm = EntityComponentManager::new();
    let tags: Vec<Tag> = (0..ENTITY_COUNT).map(|i| Tag::with_key("E", i)).collect();
    for (i, tag) in tags.iter().enumerate() {
        let x = i as f32;
        ecm.create_entity(tag.clone())
            .with(Position { x, y: x, z: x })
            .with(Velocity { dx: 0.1 });
    }
    let _ = ecm.synchronize(thread::current().id());
    (ecm, tags)
}

// =============================================================================
// COMMIT
// =============================================================================

fn bench_create_and_commit(c: &mut Criterion) {
    c.bench_function("create_commit_10k_entities", |b| {
        b.iter_batched(
            EntityComponentManager::new,
            |mut ecm| {
                for i in 0..ENTITY_COUNT {
                    ecm.create_entity(Tag::with_key("E", i))
                        .with(Position { x: 0.0, y: 0.0, z: 0.0 });
                }
                let _ = ecm.synchronize(thread::current().id());
                black_box(ecm.entity_count())
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_update_and_commit(c: &mut Criterion) {
    let (mut ecm, tags) = populated();
    let me = thread::current().id();

    c.bench_function("update_commit_10k_components", |b| {
        b.iter(|| {
            for tag in &tags {
                ecm.update_component(tag, Velocity { dx: 0.2 });
            }
            let _ = ecm.synchronize(me);
        });
    });
}

// =============================================================================
// READS
// =============================================================================

fn bench_typed_reads(c: &mut Criterion) {
    let (ecm, tags) = populated();

    c.bench_function("get_component_10k", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for tag in &tags {
                if let Ok(p) = ecm.get_component::<Position>(tag) {
                    sum += p.x + p.y + p.z;
                }
            }
            black_box(sum)
        });
    });

    c.bench_function("entities_try_get2_10k", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for e in ecm.entities() {
                if let Some((p, v)) = e.try_get2::<Position, Velocity>() {
                    sum += p.x * v.dx;
                }
            }
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    bench_create_and_commit,
    bench_update_and_commit,
    bench_typed_reads
);
criterion_main!(benches);
