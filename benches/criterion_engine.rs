#![cfg(all(feature = "criterion-bench", feature = "memory-store"))]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use futures::executor::block_on;
use rs_guard::{
    Engine, EngineBuilder, Guard, MemoryStore, PermissionName, PrincipalId, Requirement, RoleName,
};

fn setup_role_fanout(role_count: usize) -> (Engine<MemoryStore>, PrincipalId, PermissionName) {
    let engine = EngineBuilder::new(MemoryStore::new()).build();
    let principal = PrincipalId::try_from("principal_bench").unwrap();

    block_on(async {
        let registry = engine.registry();
        for i in 0..role_count {
            let role = registry
                .create_role(RoleName::try_from(format!("role_{i}").as_str()).unwrap(), None)
                .await
                .unwrap();
            let permission = registry
                .create_permission(
                    PermissionName::try_from(format!("invoice_{i}:read").as_str()).unwrap(),
                    None,
                )
                .await
                .unwrap();
            registry
                .give_permission_to_role(&role, &permission)
                .await
                .unwrap();
            registry.assign_role(&principal, &role).await.unwrap();
        }
    });

    let required =
        PermissionName::try_from(format!("invoice_{}:read", role_count - 1).as_str()).unwrap();
    (engine, principal, required)
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_permission_snapshot");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    let guard = Guard::default();
    let (engine, principal, permission) = setup_role_fanout(8);
    assert!(block_on(engine.has_permission(&principal, &permission, &guard)).unwrap());

    group.bench_function("cached", |b| {
        b.iter(|| {
            let allowed = block_on(engine.has_permission(&principal, &permission, &guard)).unwrap();
            black_box(allowed);
        });
    });
    group.bench_function("after_invalidation", |b| {
        b.iter(|| {
            engine.invalidator().invalidate();
            let allowed = block_on(engine.has_permission(&principal, &permission, &guard)).unwrap();
            black_box(allowed);
        });
    });

    group.finish();
}

fn bench_role_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_permission_role_fanout");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    let guard = Guard::default();
    for role_count in [1usize, 8, 32, 128] {
        let (engine, principal, required) = setup_role_fanout(role_count);
        block_on(engine.load_snapshot()).unwrap();

        let id = BenchmarkId::from_parameter(role_count);
        group.bench_with_input(id, &role_count, |b, _| {
            b.iter(|| {
                let allowed =
                    block_on(engine.has_permission(&principal, &required, &guard)).unwrap();
                black_box(allowed);
            });
        });
    }

    group.finish();
}

fn bench_requirement(c: &mut Criterion) {
    let mut group = c.benchmark_group("requirement");
    group.sample_size(30);
    group.throughput(Throughput::Elements(1));

    let guard = Guard::default();
    let (engine, principal, _) = setup_role_fanout(8);
    block_on(engine.load_snapshot()).unwrap();

    group.bench_function("parse", |b| {
        b.iter(|| black_box(Requirement::permissions("invoice_0:read|invoice_7:read").unwrap()));
    });

    let requirement = Requirement::permissions("missing:read|invoice_7:read").unwrap();
    group.bench_function("satisfies", |b| {
        b.iter(|| {
            let allowed =
                block_on(engine.satisfies(&principal, &requirement, &guard)).unwrap();
            black_box(allowed);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_snapshot, bench_role_fanout, bench_requirement);
criterion_main!(benches);
