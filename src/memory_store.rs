use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use thiserror::Error;

use crate::error::StoreError;
use crate::model::{Permission, Role};
use crate::store::{MutationStore, PermissionStore, PrincipalStore, RoleStore};
use crate::types::{
    EntityKind, Guard, PermissionId, PermissionName, PrincipalId, RoleId, RoleName,
};

/// Errors raised by [`MemoryStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    /// The `(name, guard)` pair is already taken.
    #[error("{kind} `{name}` already exists for guard `{guard}`")]
    Duplicate {
        kind: EntityKind,
        name: String,
        guard: Guard,
    },
    /// No role with this id.
    #[error("unknown role id {0}")]
    UnknownRole(RoleId),
    /// No permission with this id.
    #[error("unknown permission id {0}")]
    UnknownPermission(PermissionId),
    /// A writer panicked while holding the lock.
    #[error("memory store lock poisoned")]
    Poisoned,
}

/// In-memory store implementation for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    roles: HashMap<RoleId, (RoleName, Guard)>,
    permissions: HashMap<PermissionId, (PermissionName, Guard)>,
    role_permissions: HashMap<RoleId, HashSet<PermissionId>>,
    principal_roles: HashMap<PrincipalId, HashSet<RoleId>>,
    principal_permissions: HashMap<PrincipalId, HashSet<PermissionId>>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn role(&self, id: &RoleId) -> Option<Role> {
        let (name, guard) = self.roles.get(id)?;
        let mut role = Role::new(id.clone(), name.clone(), guard.clone());
        role.permissions = self
            .role_permissions
            .get(id)
            .map(|perms| perms.iter().cloned().collect())
            .unwrap_or_default();
        Some(role)
    }

    fn permission(&self, id: &PermissionId) -> Option<Permission> {
        let (name, guard) = self.permissions.get(id)?;
        let mut permission = Permission::new(id.clone(), name.clone(), guard.clone());
        permission.roles = self
            .role_permissions
            .iter()
            .filter(|(_, perms)| perms.contains(id))
            .map(|(role, _)| role.clone())
            .collect();
        Some(permission)
    }

    fn role_name_taken(&self, name: &RoleName, guard: &Guard, except: Option<&RoleId>) -> bool {
        self.roles
            .iter()
            .any(|(id, (n, g))| n == name && g == guard && Some(id) != except)
    }

    fn permission_name_taken(
        &self,
        name: &PermissionName,
        guard: &Guard,
        except: Option<&PermissionId>,
    ) -> bool {
        self.permissions
            .iter()
            .any(|(id, (n, g))| n == name && g == guard && Some(id) != except)
    }

    fn ensure_role(&self, id: &RoleId) -> Result<(), MemoryStoreError> {
        if self.roles.contains_key(id) {
            Ok(())
        } else {
            Err(MemoryStoreError::UnknownRole(id.clone()))
        }
    }

    fn ensure_permission(&self, id: &PermissionId) -> Result<(), MemoryStoreError> {
        if self.permissions.contains_key(id) {
            Ok(())
        } else {
            Err(MemoryStoreError::UnknownPermission(id.clone()))
        }
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, MemoryStoreError> {
        self.inner.read().map_err(|_| MemoryStoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, MemoryStoreError> {
        self.inner.write().map_err(|_| MemoryStoreError::Poisoned)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn all_roles(&self) -> std::result::Result<Vec<Role>, StoreError> {
        let state = self.read()?;
        Ok(state.roles.keys().filter_map(|id| state.role(id)).collect())
    }

    async fn find_role_by_name(
        &self,
        name: &RoleName,
        guard: &Guard,
    ) -> std::result::Result<Option<Role>, StoreError> {
        let state = self.read()?;
        Ok(state
            .roles
            .iter()
            .find(|(_, (n, g))| n == name && g == guard)
            .and_then(|(id, _)| state.role(id)))
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn all_permissions(&self) -> std::result::Result<Vec<Permission>, StoreError> {
        let state = self.read()?;
        Ok(state
            .permissions
            .keys()
            .filter_map(|id| state.permission(id))
            .collect())
    }

    async fn find_permission_by_name(
        &self,
        name: &PermissionName,
        guard: &Guard,
    ) -> std::result::Result<Option<Permission>, StoreError> {
        let state = self.read()?;
        Ok(state
            .permissions
            .iter()
            .find(|(_, (n, g))| n == name && g == guard)
            .and_then(|(id, _)| state.permission(id)))
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn principal_roles(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<Role>, StoreError> {
        let state = self.read()?;
        Ok(state
            .principal_roles
            .get(principal)
            .map(|roles| roles.iter().filter_map(|id| state.role(id)).collect())
            .unwrap_or_default())
    }

    async fn principal_permissions(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<Permission>, StoreError> {
        let state = self.read()?;
        Ok(state
            .principal_permissions
            .get(principal)
            .map(|perms| perms.iter().filter_map(|id| state.permission(id)).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl MutationStore for MemoryStore {
    async fn insert_role(
        &self,
        name: RoleName,
        guard: Guard,
    ) -> std::result::Result<Role, StoreError> {
        let mut state = self.write()?;
        if state.role_name_taken(&name, &guard, None) {
            return Err(MemoryStoreError::Duplicate {
                kind: EntityKind::Role,
                name: name.to_string(),
                guard,
            }
            .into());
        }
        let id = RoleId::from_string(state.next_id("role"));
        state.roles.insert(id.clone(), (name.clone(), guard.clone()));
        Ok(Role::new(id, name, guard))
    }

    async fn insert_permission(
        &self,
        name: PermissionName,
        guard: Guard,
    ) -> std::result::Result<Permission, StoreError> {
        let mut state = self.write()?;
        if state.permission_name_taken(&name, &guard, None) {
            return Err(MemoryStoreError::Duplicate {
                kind: EntityKind::Permission,
                name: name.to_string(),
                guard,
            }
            .into());
        }
        let id = PermissionId::from_string(state.next_id("perm"));
        state
            .permissions
            .insert(id.clone(), (name.clone(), guard.clone()));
        Ok(Permission::new(id, name, guard))
    }

    async fn rename_role(
        &self,
        role: &RoleId,
        name: RoleName,
    ) -> std::result::Result<Role, StoreError> {
        let mut state = self.write()?;
        let guard = match state.roles.get(role) {
            Some((_, guard)) => guard.clone(),
            None => return Err(MemoryStoreError::UnknownRole(role.clone()).into()),
        };
        if state.role_name_taken(&name, &guard, Some(role)) {
            return Err(MemoryStoreError::Duplicate {
                kind: EntityKind::Role,
                name: name.to_string(),
                guard,
            }
            .into());
        }
        state.roles.insert(role.clone(), (name, guard));
        state
            .role(role)
            .ok_or_else(|| MemoryStoreError::UnknownRole(role.clone()).into())
    }

    async fn rename_permission(
        &self,
        permission: &PermissionId,
        name: PermissionName,
    ) -> std::result::Result<Permission, StoreError> {
        let mut state = self.write()?;
        let guard = match state.permissions.get(permission) {
            Some((_, guard)) => guard.clone(),
            None => return Err(MemoryStoreError::UnknownPermission(permission.clone()).into()),
        };
        if state.permission_name_taken(&name, &guard, Some(permission)) {
            return Err(MemoryStoreError::Duplicate {
                kind: EntityKind::Permission,
                name: name.to_string(),
                guard,
            }
            .into());
        }
        state.permissions.insert(permission.clone(), (name, guard));
        state
            .permission(permission)
            .ok_or_else(|| MemoryStoreError::UnknownPermission(permission.clone()).into())
    }

    async fn delete_role(&self, role: &RoleId) -> std::result::Result<bool, StoreError> {
        let mut state = self.write()?;
        if state.roles.remove(role).is_none() {
            return Ok(false);
        }
        state.role_permissions.remove(role);
        for roles in state.principal_roles.values_mut() {
            roles.remove(role);
        }
        Ok(true)
    }

    async fn delete_permission(
        &self,
        permission: &PermissionId,
    ) -> std::result::Result<bool, StoreError> {
        let mut state = self.write()?;
        if state.permissions.remove(permission).is_none() {
            return Ok(false);
        }
        for perms in state.role_permissions.values_mut() {
            perms.remove(permission);
        }
        for perms in state.principal_permissions.values_mut() {
            perms.remove(permission);
        }
        Ok(true)
    }

    async fn attach_role_permission(
        &self,
        role: &RoleId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.write()?;
        state.ensure_role(role)?;
        state.ensure_permission(permission)?;
        state
            .role_permissions
            .entry(role.clone())
            .or_default()
            .insert(permission.clone());
        Ok(())
    }

    async fn detach_role_permission(
        &self,
        role: &RoleId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.write()?;
        if let Some(perms) = state.role_permissions.get_mut(role) {
            perms.remove(permission);
        }
        Ok(())
    }

    async fn attach_principal_role(
        &self,
        principal: &PrincipalId,
        role: &RoleId,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.write()?;
        state.ensure_role(role)?;
        state
            .principal_roles
            .entry(principal.clone())
            .or_default()
            .insert(role.clone());
        Ok(())
    }

    async fn detach_principal_role(
        &self,
        principal: &PrincipalId,
        role: &RoleId,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.write()?;
        if let Some(roles) = state.principal_roles.get_mut(principal) {
            roles.remove(role);
        }
        Ok(())
    }

    async fn attach_principal_permission(
        &self,
        principal: &PrincipalId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.write()?;
        state.ensure_permission(permission)?;
        state
            .principal_permissions
            .entry(principal.clone())
            .or_default()
            .insert(permission.clone());
        Ok(())
    }

    async fn detach_principal_permission(
        &self,
        principal: &PrincipalId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError> {
        let mut state = self.write()?;
        if let Some(perms) = state.principal_permissions.get_mut(principal) {
            perms.remove(permission);
        }
        Ok(())
    }
}
