use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::hooks::{MutationEvent, MutationOp};
use crate::model::{Permission, PermissionRef, Role, RoleRef};
use crate::store::{MutationStore, Store};
use crate::types::{EntityKind, Guard, PermissionName, PrincipalId, RoleName};

/// Write path for roles, permissions, and their assignments.
///
/// Every role or permission write that succeeds invalidates the engine's
/// snapshot and notifies registered listeners before returning. Principal
/// assignments are read live by the engine and leave the snapshot intact.
#[derive(Debug)]
pub struct Registry<'a, S> {
    engine: &'a Engine<S>,
}

impl<S> Engine<S>
where
    S: Store + MutationStore,
{
    /// Returns the registry bound to this engine's store and cache.
    pub fn registry(&self) -> Registry<'_, S> {
        Registry { engine: self }
    }
}

impl<S> Registry<'_, S>
where
    S: Store + MutationStore,
{
    /// Creates a role. `None` guard means the default guard.
    pub async fn create_role(&self, name: RoleName, guard: Option<Guard>) -> Result<Role> {
        let guard = self.guard_or_default(guard);
        let role = self
            .store()
            .insert_role(name, guard)
            .await
            .map_err(Error::from)?;
        self.committed(MutationEvent::new(
            EntityKind::Role,
            MutationOp::Created,
            role.name.as_str(),
            &role.guard,
        ));
        Ok(role)
    }

    /// Creates a permission. `None` guard means the default guard.
    pub async fn create_permission(
        &self,
        name: PermissionName,
        guard: Option<Guard>,
    ) -> Result<Permission> {
        let guard = self.guard_or_default(guard);
        let permission = self
            .store()
            .insert_permission(name, guard)
            .await
            .map_err(Error::from)?;
        self.committed(MutationEvent::new(
            EntityKind::Permission,
            MutationOp::Created,
            permission.name.as_str(),
            &permission.guard,
        ));
        Ok(permission)
    }

    /// Finds a role by name, failing with [`Error::NotFound`] if absent.
    pub async fn find_role(&self, name: &RoleName, guard: Option<&Guard>) -> Result<Role> {
        let guard = guard.unwrap_or(self.engine.default_guard());
        self.store()
            .find_role_by_name(name, guard)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| self.lookup_failed(EntityKind::Role, name.as_str(), guard))
    }

    /// Finds a permission by name, failing with [`Error::NotFound`] if absent.
    pub async fn find_permission(
        &self,
        name: &PermissionName,
        guard: Option<&Guard>,
    ) -> Result<Permission> {
        let guard = guard.unwrap_or(self.engine.default_guard());
        self.store()
            .find_permission_by_name(name, guard)
            .await
            .map_err(Error::from)?
            .ok_or_else(|| self.lookup_failed(EntityKind::Permission, name.as_str(), guard))
    }

    /// Returns the existing role or creates it.
    pub async fn find_or_create_role(&self, name: RoleName, guard: Option<Guard>) -> Result<Role> {
        let guard = self.guard_or_default(guard);
        match self.store().find_role_by_name(&name, &guard).await? {
            Some(role) => Ok(role),
            None => self.create_role(name, Some(guard)).await,
        }
    }

    /// Returns the existing permission or creates it.
    pub async fn find_or_create_permission(
        &self,
        name: PermissionName,
        guard: Option<Guard>,
    ) -> Result<Permission> {
        let guard = self.guard_or_default(guard);
        match self.store().find_permission_by_name(&name, &guard).await? {
            Some(permission) => Ok(permission),
            None => self.create_permission(name, Some(guard)).await,
        }
    }

    /// Renames a role.
    pub async fn rename_role(&self, role: impl Into<RoleRef>, name: RoleName) -> Result<Role> {
        let role = self.resolve_role(role.into()).await?;
        let renamed = self
            .store()
            .rename_role(&role.id, name)
            .await
            .map_err(Error::from)?;
        self.committed(MutationEvent::new(
            EntityKind::Role,
            MutationOp::Updated,
            renamed.name.as_str(),
            &renamed.guard,
        ));
        Ok(renamed)
    }

    /// Renames a permission.
    pub async fn rename_permission(
        &self,
        permission: impl Into<PermissionRef>,
        name: PermissionName,
    ) -> Result<Permission> {
        let permission = self.resolve_permission(permission.into(), None).await?;
        let renamed = self
            .store()
            .rename_permission(&permission.id, name)
            .await
            .map_err(Error::from)?;
        self.committed(MutationEvent::new(
            EntityKind::Permission,
            MutationOp::Updated,
            renamed.name.as_str(),
            &renamed.guard,
        ));
        Ok(renamed)
    }

    /// Deletes a role and every link to it. Returns whether it existed.
    pub async fn delete_role(&self, role: impl Into<RoleRef>) -> Result<bool> {
        let role = self.resolve_role(role.into()).await?;
        let existed = self
            .store()
            .delete_role(&role.id)
            .await
            .map_err(Error::from)?;
        if existed {
            self.committed(MutationEvent::new(
                EntityKind::Role,
                MutationOp::Deleted,
                role.name.as_str(),
                &role.guard,
            ));
        }
        Ok(existed)
    }

    /// Deletes a permission and every link to it. Returns whether it existed.
    pub async fn delete_permission(&self, permission: impl Into<PermissionRef>) -> Result<bool> {
        let permission = self.resolve_permission(permission.into(), None).await?;
        let existed = self
            .store()
            .delete_permission(&permission.id)
            .await
            .map_err(Error::from)?;
        if existed {
            self.committed(MutationEvent::new(
                EntityKind::Permission,
                MutationOp::Deleted,
                permission.name.as_str(),
                &permission.guard,
            ));
        }
        Ok(existed)
    }

    /// Grants a permission to a role. Both must share a guard.
    ///
    /// A named permission without a guard is looked up in the role's guard.
    pub async fn give_permission_to_role(
        &self,
        role: impl Into<RoleRef>,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let role = self.resolve_role(role.into()).await?;
        let permission = self
            .resolve_permission(permission.into(), Some(&role.guard))
            .await?;
        ensure_same_guard(&role.guard, &permission.guard)?;
        self.store()
            .attach_role_permission(&role.id, &permission.id)
            .await
            .map_err(Error::from)?;
        self.committed(MutationEvent::new(
            EntityKind::Role,
            MutationOp::Updated,
            role.name.as_str(),
            &role.guard,
        ));
        Ok(())
    }

    /// Revokes a permission from a role.
    pub async fn revoke_permission_from_role(
        &self,
        role: impl Into<RoleRef>,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let role = self.resolve_role(role.into()).await?;
        let permission = self
            .resolve_permission(permission.into(), Some(&role.guard))
            .await?;
        self.store()
            .detach_role_permission(&role.id, &permission.id)
            .await
            .map_err(Error::from)?;
        self.committed(MutationEvent::new(
            EntityKind::Role,
            MutationOp::Updated,
            role.name.as_str(),
            &role.guard,
        ));
        Ok(())
    }

    /// Assigns a role to a principal.
    pub async fn assign_role(
        &self,
        principal: &PrincipalId,
        role: impl Into<RoleRef>,
    ) -> Result<()> {
        let role = self.resolve_role(role.into()).await?;
        self.store()
            .attach_principal_role(principal, &role.id)
            .await
            .map_err(Error::from)?;
        debug!(principal = %principal, role = %role.name, guard = %role.guard, "role assigned");
        Ok(())
    }

    /// Removes a role from a principal.
    pub async fn remove_role(
        &self,
        principal: &PrincipalId,
        role: impl Into<RoleRef>,
    ) -> Result<()> {
        let role = self.resolve_role(role.into()).await?;
        self.store()
            .detach_principal_role(principal, &role.id)
            .await
            .map_err(Error::from)?;
        debug!(principal = %principal, role = %role.name, guard = %role.guard, "role removed");
        Ok(())
    }

    /// Grants a permission directly to a principal.
    pub async fn give_permission_to(
        &self,
        principal: &PrincipalId,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let permission = self.resolve_permission(permission.into(), None).await?;
        self.store()
            .attach_principal_permission(principal, &permission.id)
            .await
            .map_err(Error::from)?;
        debug!(
            principal = %principal,
            permission = %permission.name,
            guard = %permission.guard,
            "permission granted"
        );
        Ok(())
    }

    /// Revokes a directly granted permission from a principal.
    pub async fn revoke_permission_from(
        &self,
        principal: &PrincipalId,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let permission = self.resolve_permission(permission.into(), None).await?;
        self.store()
            .detach_principal_permission(principal, &permission.id)
            .await
            .map_err(Error::from)?;
        debug!(
            principal = %principal,
            permission = %permission.name,
            guard = %permission.guard,
            "permission revoked"
        );
        Ok(())
    }

    fn store(&self) -> &S {
        self.engine.store()
    }

    fn guard_or_default(&self, guard: Option<Guard>) -> Guard {
        guard.unwrap_or_else(|| self.engine.default_guard().clone())
    }

    async fn resolve_role(&self, role: RoleRef) -> Result<Role> {
        match role {
            RoleRef::Entity(role) => Ok(role),
            RoleRef::Named { name, guard } => self.find_role(&name, guard.as_ref()).await,
        }
    }

    async fn resolve_permission(
        &self,
        permission: PermissionRef,
        fallback_guard: Option<&Guard>,
    ) -> Result<Permission> {
        match permission {
            PermissionRef::Entity(permission) => Ok(permission),
            PermissionRef::Named { name, guard } => {
                let guard = guard.as_ref().or(fallback_guard);
                self.find_permission(&name, guard).await
            }
        }
    }

    fn lookup_failed(&self, kind: EntityKind, name: &str, guard: &Guard) -> Error {
        if self.engine.log_lookup_failures() {
            warn!(kind = %kind, name, guard = %guard, "lookup failed");
        }
        Error::not_found(kind, name, guard)
    }

    fn committed(&self, event: MutationEvent) {
        self.engine.invalidator().notify(&event);
        for listener in self.engine.listeners() {
            listener.on_mutation(&event);
        }
        info!(
            kind = %event.kind,
            op = %event.op,
            name = %event.name,
            guard = %event.guard,
            "registry write"
        );
    }
}

fn ensure_same_guard(expected: &Guard, found: &Guard) -> Result<()> {
    if expected != found {
        return Err(Error::GuardMismatch {
            expected: expected.clone(),
            found: found.clone(),
        });
    }
    Ok(())
}
