use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures::lock::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::snapshot::PermissionSnapshot;
use crate::store::{PermissionStore, RoleStore};

/// Process-wide holder of the live [`PermissionSnapshot`].
///
/// Readers load the current snapshot with a single atomic pointer read.
/// [`invalidate`](Self::invalidate) only bumps a generation counter; the next
/// [`get`](Self::get) notices the mismatch and rebuilds off to the side
/// before swapping the pointer, so readers see either the old complete
/// snapshot or the new complete one. Concurrent rebuilds are serialized and
/// callers that queued behind a rebuild reuse its result.
#[derive(Debug)]
pub struct PermissionCache {
    current: ArcSwapOption<PermissionSnapshot>,
    generation: AtomicU64,
    rebuilds: AtomicU64,
    rebuild_lock: Mutex<()>,
    ttl: Option<Duration>,
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionCache {
    /// Creates an empty cache. The first [`get`](Self::get) builds the snapshot.
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            rebuild_lock: Mutex::new(()),
            ttl: None,
        }
    }

    /// Treats snapshots older than `ttl` as stale.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Returns a valid snapshot, rebuilding it from `store` when stale.
    ///
    /// A failed rebuild returns the store error and leaves the cache stale.
    pub async fn get<S>(&self, store: &S) -> Result<Arc<PermissionSnapshot>>
    where
        S: RoleStore + PermissionStore + Sync + ?Sized,
    {
        if let Some(snapshot) = self.fresh() {
            return Ok(snapshot);
        }

        let _rebuild = self.rebuild_lock.lock().await;
        if let Some(snapshot) = self.fresh() {
            return Ok(snapshot);
        }

        // Read the generation before the store so a write landing mid-rebuild
        // leaves this snapshot stale.
        let generation = self.generation.load(Ordering::Acquire);
        let roles = store.all_roles().await.map_err(|err| {
            warn!(generation, error = %err, "permission snapshot rebuild failed");
            Error::from(err)
        })?;
        let permissions = store.all_permissions().await.map_err(|err| {
            warn!(generation, error = %err, "permission snapshot rebuild failed");
            Error::from(err)
        })?;

        let snapshot = Arc::new(PermissionSnapshot::build(generation, roles, permissions));
        self.current.store(Some(Arc::clone(&snapshot)));
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        debug!(
            generation,
            roles = snapshot.role_count(),
            permissions = snapshot.permission_count(),
            "permission snapshot rebuilt"
        );
        Ok(snapshot)
    }

    /// Marks the live snapshot stale. Idempotent; never rebuilds eagerly.
    pub fn invalidate(&self) {
        let previous = self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(generation = previous + 1, "permission snapshot invalidated");
    }

    /// Returns whether the next [`get`](Self::get) would rebuild.
    pub fn is_stale(&self) -> bool {
        self.fresh().is_none()
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of completed rebuilds since construction.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    fn fresh(&self) -> Option<Arc<PermissionSnapshot>> {
        let snapshot = self.current.load_full()?;
        if snapshot.generation() != self.generation.load(Ordering::Acquire) {
            return None;
        }
        if let Some(ttl) = self.ttl
            && snapshot.built_at().elapsed() > ttl
        {
            return None;
        }
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::{Permission, Role};
    use crate::types::{Guard, PermissionId, PermissionName, RoleId, RoleName};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct CountingStore {
        roles: StdMutex<Vec<Role>>,
        listings: AtomicU64,
        fail: AtomicBool,
    }

    #[async_trait]
    impl RoleStore for CountingStore {
        async fn all_roles(&self) -> std::result::Result<Vec<Role>, StoreError> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err("store offline".into());
            }
            Ok(self.roles.lock().unwrap().clone())
        }

        async fn find_role_by_name(
            &self,
            _name: &RoleName,
            _guard: &Guard,
        ) -> std::result::Result<Option<Role>, StoreError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl PermissionStore for CountingStore {
        async fn all_permissions(&self) -> std::result::Result<Vec<Permission>, StoreError> {
            Ok(vec![Permission::new(
                PermissionId::try_from("p1").unwrap(),
                PermissionName::try_from("publish-articles").unwrap(),
                Guard::default(),
            )])
        }

        async fn find_permission_by_name(
            &self,
            _name: &PermissionName,
            _guard: &Guard,
        ) -> std::result::Result<Option<Permission>, StoreError> {
            Ok(None)
        }
    }

    fn editor() -> Role {
        Role::new(
            RoleId::try_from("r1").unwrap(),
            RoleName::try_from("editor").unwrap(),
            Guard::default(),
        )
    }

    #[test]
    fn get_builds_once_and_reuses_snapshot() {
        let store = CountingStore::default();
        let cache = PermissionCache::new();

        let first = block_on(cache.get(&store)).unwrap();
        let second = block_on(cache.get(&store)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.rebuild_count(), 1);
        assert_eq!(store.listings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn double_invalidate_triggers_single_rebuild() {
        let store = CountingStore::default();
        let cache = PermissionCache::new();
        block_on(cache.get(&store)).unwrap();

        cache.invalidate();
        cache.invalidate();
        assert!(cache.is_stale());
        block_on(cache.get(&store)).unwrap();
        block_on(cache.get(&store)).unwrap();

        assert_eq!(cache.rebuild_count(), 2);
        assert!(!cache.is_stale());
    }

    #[test]
    fn rebuild_reflects_writes_after_invalidate() {
        let store = CountingStore::default();
        let cache = PermissionCache::new();
        let before = block_on(cache.get(&store)).unwrap();
        assert_eq!(before.role_count(), 0);

        store.roles.lock().unwrap().push(editor());
        cache.invalidate();

        let after = block_on(cache.get(&store)).unwrap();
        assert!(after.find_role("editor", &Guard::default()).is_some());
    }

    #[test]
    fn failed_rebuild_propagates_and_is_not_cached() {
        let store = CountingStore::default();
        let cache = PermissionCache::new();
        store.fail.store(true, Ordering::SeqCst);

        let result = block_on(cache.get(&store));
        assert!(matches!(result, Err(Error::Store(_))));
        assert!(cache.is_stale());

        store.fail.store(false, Ordering::SeqCst);
        assert!(block_on(cache.get(&store)).is_ok());
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[test]
    fn ttl_expires_snapshot() {
        let store = CountingStore::default();
        let cache = PermissionCache::new().with_ttl(Duration::from_millis(10));
        block_on(cache.get(&store)).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert!(cache.is_stale());
        block_on(cache.get(&store)).unwrap();
        assert_eq!(cache.rebuild_count(), 2);
    }
}
