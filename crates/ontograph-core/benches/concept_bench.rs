//! # Concept Benchmarks
//!
//! Performance benchmarks for ontograph-core concept operations.
//!
//! Run with: `cargo bench -p ontograph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ontograph_core::{DataType, Session};
use std::hint::black_box;

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_entity_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_creation");

    for size in [100, 1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut session = Session::in_memory().expect("session");
                let mut tx = session.transaction().expect("tx");
                let person = tx.put_entity_type("person").expect("person");
                for _ in 0..size {
                    black_box(tx.add_entity(&person).expect("entity"));
                }
            });
        });
    }

    group.finish();
}

fn bench_attribute_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("attribute_put");

    // Half the puts hit an existing attribute.
    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut session = Session::in_memory().expect("session");
                let mut tx = session.transaction().expect("tx");
                let age = tx.put_attribute_type("age", DataType::Long).expect("age");
                for i in 0..size {
                    black_box(tx.put_attribute(&age, (i / 2) as i64).expect("put"));
                }
            });
        });
    }

    group.finish();
}

fn bench_reification(c: &mut Criterion) {
    let mut group = c.benchmark_group("reification");

    for size in [100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut session = Session::in_memory().expect("session");
                let mut tx = session.transaction().expect("tx");
                let person = tx.put_entity_type("person").expect("person");
                let name = tx.put_attribute_type("name", DataType::String).expect("name");
                tx.has(&person, &name).expect("has");
                let witness = tx.put_role("witness").expect("witness");
                let has_name = tx
                    .get_relationship_type("@has-name")
                    .expect("get")
                    .expect("implicit");
                tx.relates(&has_name, &witness).expect("relates");
                tx.plays(&person, &witness).expect("plays");

                let observer = tx.add_entity(&person).expect("observer");
                for i in 0..size {
                    let owner = tx.add_entity(&person).expect("owner");
                    let value = tx.put_attribute(&name, format!("n{i}")).expect("value");
                    let link = tx.has_attribute(&owner, &value).expect("attach");
                    tx.add_role_player(&link, &witness, &observer).expect("promote");
                }
                black_box(tx.cached_concepts())
            });
        });
    }

    group.finish();
}

fn bench_instance_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("instance_scan");

    for size in [1000, 5000].iter() {
        let mut session = Session::in_memory().expect("session");
        {
            let mut tx = session.transaction().expect("tx");
            let person = tx.put_entity_type("person").expect("person");
            for i in 0..*size {
                if i % 1000 == 0 {
                    tx.create_shard(&person).expect("rotate");
                }
                tx.add_entity(&person).expect("entity");
            }
            tx.commit().expect("commit");
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut tx = session.transaction().expect("tx");
                let person = tx.get_entity_type("person").expect("get").expect("person");
                black_box(tx.instances(&person).expect("instances").count())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_entity_creation,
    bench_attribute_put,
    bench_reification,
    bench_instance_scan,
);
criterion_main!(benches);
