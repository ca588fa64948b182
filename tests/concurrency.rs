#![cfg(feature = "memory-store")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use futures::executor::block_on;
use rs_guard::{Engine, EngineBuilder, Guard, MemoryStore, PermissionName, PrincipalId, RoleName};

const ROLES: usize = 16;
const READERS: usize = 8;

fn seeded_engine() -> (Arc<Engine<MemoryStore>>, PrincipalId) {
    let engine = Arc::new(EngineBuilder::new(MemoryStore::new()).build());
    let user = PrincipalId::try_from("user_1").unwrap();
    block_on(async {
        let registry = engine.registry();
        for i in 0..ROLES {
            let role = registry
                .create_role(RoleName::try_from(format!("role_{i}").as_str()).unwrap(), None)
                .await
                .unwrap();
            let permission = registry
                .create_permission(
                    PermissionName::try_from(format!("perm_{i}").as_str()).unwrap(),
                    None,
                )
                .await
                .unwrap();
            registry
                .give_permission_to_role(&role, &permission)
                .await
                .unwrap();
            registry.assign_role(&user, &role).await.unwrap();
        }
    });
    (engine, user)
}

#[test]
fn readers_never_observe_partial_snapshots() {
    let (engine, user) = seeded_engine();
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let engine = Arc::clone(&engine);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                engine.invalidator().invalidate();
                thread::yield_now();
            }
        })
    };

    let mut readers = Vec::with_capacity(READERS);
    for _ in 0..READERS {
        let engine = Arc::clone(&engine);
        let user = user.clone();
        readers.push(thread::spawn(move || {
            let guard = Guard::default();
            for _ in 0..200 {
                let snapshot = block_on(engine.load_snapshot()).unwrap();
                assert_eq!(snapshot.role_count(), ROLES);
                assert_eq!(snapshot.permission_count(), ROLES);

                let names = block_on(engine.permission_names(&user, &guard)).unwrap();
                assert_eq!(names.len(), ROLES);
            }
        }));
    }

    for reader in readers {
        reader.join().expect("reader panicked");
    }
    stop.store(true, Ordering::Relaxed);
    writer.join().expect("writer panicked");
}

#[test]
fn burst_of_readers_after_invalidation_rebuilds_once() {
    let (engine, _) = seeded_engine();
    block_on(engine.load_snapshot()).unwrap();
    engine.invalidator().invalidate();
    let before = engine.cache().rebuild_count();

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || block_on(engine.load_snapshot()).unwrap().generation())
        })
        .collect();
    let generations: Vec<u64> = handles
        .into_iter()
        .map(|handle| handle.join().expect("reader panicked"))
        .collect();

    assert_eq!(engine.cache().rebuild_count(), before + 1);
    assert!(generations.iter().all(|generation| *generation == generations[0]));
}

#[test]
fn concurrent_writes_are_all_visible() {
    let (engine, user) = seeded_engine();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                block_on(async {
                    let registry = engine.registry();
                    let name = PermissionName::try_from(format!("extra_{i}").as_str()).unwrap();
                    let permission = registry.create_permission(name, None).await.unwrap();
                    let role = RoleName::try_from("role_0").unwrap();
                    registry
                        .give_permission_to_role(role, &permission)
                        .await
                        .unwrap();
                    // Interleave reads with the writes of other threads.
                    engine.load_snapshot().await.unwrap();
                });
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked");
    }

    let names = block_on(engine.permission_names(&user, &Guard::default())).unwrap();
    assert_eq!(names.len(), ROLES + 4);
}
