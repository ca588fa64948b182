use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::PermissionCache;
use crate::config::{GuardConfig, Messages};
use crate::error::{Error, Result};
use crate::hooks::{Invalidator, MutationListener};
use crate::model::{Permission, PermissionRef, Role, RoleRef};
use crate::requirement::Requirement;
use crate::snapshot::PermissionSnapshot;
use crate::store::Store;
use crate::types::{Guard, PermissionName, PrincipalId, RoleName};

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny,
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }
}

/// Roles and effective permissions a principal holds within one guard.
///
/// Pure data: every quantifier below is a set lookup with no I/O. Names not
/// present are simply not held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grants {
    roles: HashSet<RoleName>,
    permissions: HashSet<PermissionName>,
}

impl Grants {
    /// Builds grants from a principal's assignments.
    ///
    /// Only roles and permissions whose guard equals `guard` count. Role
    /// permissions come from `snapshot`; direct permissions are taken as given.
    pub fn collect(
        snapshot: &PermissionSnapshot,
        guard: &Guard,
        roles: &[Role],
        direct: &[Permission],
    ) -> Self {
        let mut grants = Self::default();
        for role in roles.iter().filter(|role| &role.guard == guard) {
            grants.roles.insert(role.name.clone());
            grants.permissions.extend(
                snapshot
                    .permissions_of_role(&role.id)
                    .filter(|permission| &permission.guard == guard)
                    .map(|permission| permission.name.clone()),
            );
        }
        grants.permissions.extend(
            direct
                .iter()
                .filter(|permission| &permission.guard == guard)
                .map(|permission| permission.name.clone()),
        );
        grants
    }

    /// Whether the permission is held.
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }

    /// Whether at least one permission is held. Empty input is `false`.
    pub fn has_any_permission<'a>(
        &self,
        names: impl IntoIterator<Item = &'a PermissionName>,
    ) -> bool {
        names.into_iter().any(|name| self.has_permission(name.as_str()))
    }

    /// Whether every permission is held. Empty input is `true`.
    pub fn has_all_permissions<'a>(
        &self,
        names: impl IntoIterator<Item = &'a PermissionName>,
    ) -> bool {
        names.into_iter().all(|name| self.has_permission(name.as_str()))
    }

    /// Whether the role is held.
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains(name)
    }

    /// Whether at least one role is held. Empty input is `false`.
    pub fn has_any_role<'a>(&self, names: impl IntoIterator<Item = &'a RoleName>) -> bool {
        names.into_iter().any(|name| self.has_role(name.as_str()))
    }

    /// Whether every role is held. Empty input is `true`.
    pub fn has_all_roles<'a>(&self, names: impl IntoIterator<Item = &'a RoleName>) -> bool {
        names.into_iter().all(|name| self.has_role(name.as_str()))
    }

    /// Whether the requirement is satisfied.
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        match requirement {
            Requirement::AnyPermission(names) => self.has_any_permission(names),
            Requirement::AnyRole(names) => self.has_any_role(names),
        }
    }

    /// Held permission names, sorted.
    pub fn permission_names(&self) -> Vec<PermissionName> {
        let mut names: Vec<PermissionName> = self.permissions.iter().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Held role names, sorted.
    pub fn role_names(&self) -> Vec<RoleName> {
        let mut names: Vec<RoleName> = self.roles.iter().cloned().collect();
        names.sort_unstable();
        names
    }
}

/// RBAC engine over an injected store and a shared snapshot cache.
///
/// The engine owns its store. Role and permission writes go through
/// [`Engine::registry`], which invalidates the snapshot; the store itself is
/// not reachable from outside the crate:
///
/// ```compile_fail
/// use rs_guard::{EngineBuilder, MemoryStore};
///
/// let engine = EngineBuilder::new(MemoryStore::new()).build();
/// let _ = engine.store();
/// ```
///
/// Hosts that also write through their own handle to the backing store call
/// [`Invalidator::invalidate`] after each commit.
pub struct Engine<S> {
    store: S,
    cache: Arc<PermissionCache>,
    default_guard: Guard,
    eager_load: bool,
    log_lookup_failures: bool,
    messages: Messages,
    listeners: Vec<Arc<dyn MutationListener>>,
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cache", &self.cache)
            .field("default_guard", &self.default_guard)
            .field("eager_load", &self.eager_load)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S> {
    store: S,
    cache: Option<Arc<PermissionCache>>,
    cache_ttl: Option<Duration>,
    default_guard: Guard,
    eager_load: bool,
    log_lookup_failures: bool,
    messages: Messages,
    listeners: Vec<Arc<dyn MutationListener>>,
}

impl<S> EngineBuilder<S> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: None,
            cache_ttl: None,
            default_guard: Guard::default(),
            eager_load: false,
            log_lookup_failures: false,
            messages: Messages::default(),
            listeners: Vec::new(),
        }
    }

    /// Creates a builder from a [`GuardConfig`].
    pub fn from_config(store: S, config: &GuardConfig) -> Result<Self> {
        let mut builder = Self::new(store)
            .default_guard(Guard::new(&config.default_guard)?)
            .eager_load(config.eager_load)
            .log_lookup_failures(config.log_lookup_failures)
            .messages(config.messages.clone());
        builder.cache_ttl = config.cache_ttl();
        Ok(builder)
    }

    /// Sets the guard used when callers do not name one.
    pub fn default_guard(mut self, guard: Guard) -> Self {
        self.default_guard = guard;
        self
    }

    /// Sets a maximum snapshot age.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Builds the snapshot in [`Engine::boot`] instead of on first use.
    pub fn eager_load(mut self, on: bool) -> Self {
        self.eager_load = on;
        self
    }

    /// Logs failed registry lookups at warn level.
    pub fn log_lookup_failures(mut self, on: bool) -> Self {
        self.log_lookup_failures = on;
        self
    }

    /// Sets denial messages.
    pub fn messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Uses an existing cache instead of creating one. Any TTL set on this
    /// builder is ignored in that case.
    pub fn shared_cache(mut self, cache: Arc<PermissionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Registers a listener called after every committed registry write.
    pub fn on_mutation(mut self, listener: impl MutationListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<S> {
        let cache = self.cache.unwrap_or_else(|| {
            let cache = PermissionCache::new();
            Arc::new(match self.cache_ttl {
                Some(ttl) => cache.with_ttl(ttl),
                None => cache,
            })
        });

        Engine {
            store: self.store,
            cache,
            default_guard: self.default_guard,
            eager_load: self.eager_load,
            log_lookup_failures: self.log_lookup_failures,
            messages: self.messages,
            listeners: self.listeners,
        }
    }
}

impl<S> Engine<S> {
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Returns the shared snapshot cache.
    pub fn cache(&self) -> &Arc<PermissionCache> {
        &self.cache
    }

    /// Returns a handle for external post-mutation hooks.
    pub fn invalidator(&self) -> Invalidator {
        Invalidator::new(Arc::clone(&self.cache))
    }

    /// Guard used when callers do not name one.
    pub fn default_guard(&self) -> &Guard {
        &self.default_guard
    }

    /// Denial messages.
    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub(crate) fn log_lookup_failures(&self) -> bool {
        self.log_lookup_failures
    }

    pub(crate) fn listeners(&self) -> &[Arc<dyn MutationListener>] {
        &self.listeners
    }
}

impl<S> Engine<S>
where
    S: Store,
{
    /// Startup hook: builds the snapshot now when eager loading is on.
    pub async fn boot(&self) -> Result<()> {
        if self.eager_load {
            self.load_snapshot().await?;
        }
        Ok(())
    }

    /// Returns the live snapshot, rebuilding it if stale.
    pub async fn load_snapshot(&self) -> Result<Arc<PermissionSnapshot>> {
        self.cache.get(&self.store).await
    }

    /// Materializes what `principal` holds within `guard`.
    pub async fn grants(&self, principal: &PrincipalId, guard: &Guard) -> Result<Grants> {
        let snapshot = self.load_snapshot().await?;
        let roles = self
            .store
            .principal_roles(principal)
            .await
            .map_err(Error::from)?;
        let direct = self
            .store
            .principal_permissions(principal)
            .await
            .map_err(Error::from)?;
        Ok(Grants::collect(&snapshot, guard, &roles, &direct))
    }

    /// Whether `principal` holds the permission directly or through a role.
    pub async fn has_permission(
        &self,
        principal: &PrincipalId,
        permission: &PermissionName,
        guard: &Guard,
    ) -> Result<bool> {
        let grants = self.grants(principal, guard).await?;
        Ok(grants.has_permission(permission.as_str()))
    }

    /// Like [`has_permission`](Self::has_permission) for a record or a name.
    /// Named references without a guard use the default guard.
    pub async fn has_permission_to(
        &self,
        principal: &PrincipalId,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let (name, guard) = match permission.into() {
            PermissionRef::Entity(permission) => (permission.name, permission.guard),
            PermissionRef::Named { name, guard } => {
                (name, guard.unwrap_or_else(|| self.default_guard.clone()))
            }
        };
        self.has_permission(principal, &name, &guard).await
    }

    /// Permission check returning a [`Decision`].
    pub async fn authorize(
        &self,
        principal: &PrincipalId,
        permission: &PermissionName,
        guard: &Guard,
    ) -> Result<Decision> {
        self.has_permission(principal, permission, guard)
            .await
            .map(Decision::from)
    }

    /// Whether at least one permission is held. Empty input is `false`.
    pub async fn has_any_permission(
        &self,
        principal: &PrincipalId,
        permissions: &[PermissionName],
        guard: &Guard,
    ) -> Result<bool> {
        if permissions.is_empty() {
            return Ok(false);
        }
        let grants = self.grants(principal, guard).await?;
        Ok(grants.has_any_permission(permissions))
    }

    /// Whether every permission is held. Empty input is `true`.
    pub async fn has_all_permissions(
        &self,
        principal: &PrincipalId,
        permissions: &[PermissionName],
        guard: &Guard,
    ) -> Result<bool> {
        if permissions.is_empty() {
            return Ok(true);
        }
        let grants = self.grants(principal, guard).await?;
        Ok(grants.has_all_permissions(permissions))
    }

    /// Whether the role is assigned.
    pub async fn has_role(
        &self,
        principal: &PrincipalId,
        role: &RoleName,
        guard: &Guard,
    ) -> Result<bool> {
        let grants = self.grants(principal, guard).await?;
        Ok(grants.has_role(role.as_str()))
    }

    /// Whether at least one role is assigned. Empty input is `false`.
    pub async fn has_any_role(
        &self,
        principal: &PrincipalId,
        roles: &[RoleName],
        guard: &Guard,
    ) -> Result<bool> {
        if roles.is_empty() {
            return Ok(false);
        }
        let grants = self.grants(principal, guard).await?;
        Ok(grants.has_any_role(roles))
    }

    /// Whether every role is assigned. Empty input is `true`.
    pub async fn has_all_roles(
        &self,
        principal: &PrincipalId,
        roles: &[RoleName],
        guard: &Guard,
    ) -> Result<bool> {
        if roles.is_empty() {
            return Ok(true);
        }
        let grants = self.grants(principal, guard).await?;
        Ok(grants.has_all_roles(roles))
    }

    /// Whether `principal` satisfies a declarative requirement.
    pub async fn satisfies(
        &self,
        principal: &PrincipalId,
        requirement: &Requirement,
        guard: &Guard,
    ) -> Result<bool> {
        let grants = self.grants(principal, guard).await?;
        let allowed = grants.satisfies(requirement);
        debug!(
            principal = %principal,
            guard = %guard,
            requirement = %requirement,
            allowed,
            "requirement evaluated"
        );
        Ok(allowed)
    }

    /// Every permission `principal` holds within `guard`, sorted by name.
    pub async fn permission_names(
        &self,
        principal: &PrincipalId,
        guard: &Guard,
    ) -> Result<Vec<PermissionName>> {
        Ok(self.grants(principal, guard).await?.permission_names())
    }

    /// Whether a role grants a permission.
    ///
    /// Unknown roles or permissions yield `false`. A named permission
    /// without a guard is looked up in the role's guard; a permission from
    /// another guard never matches.
    pub async fn role_has_permission(
        &self,
        role: impl Into<RoleRef>,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let snapshot = self.load_snapshot().await?;
        let role = match role.into() {
            RoleRef::Entity(role) => snapshot.role(&role.id).cloned(),
            RoleRef::Named { name, guard } => {
                let guard = guard.unwrap_or_else(|| self.default_guard.clone());
                snapshot.find_role(name.as_str(), &guard).cloned()
            }
        };
        let Some(role) = role else {
            return Ok(false);
        };
        let permission = match permission.into() {
            PermissionRef::Entity(permission) => snapshot.permission(&permission.id),
            PermissionRef::Named { name, guard } => {
                let guard = guard.unwrap_or_else(|| role.guard.clone());
                snapshot.find_permission(name.as_str(), &guard)
            }
        };
        Ok(permission.is_some_and(|permission| {
            permission.guard == role.guard && snapshot.role_grants(&role.id, &permission.id)
        }))
    }
}
