use crate::error::StoreError;
use crate::model::{Permission, Role};
use crate::types::{Guard, PermissionId, PermissionName, PrincipalId, RoleId, RoleName};
use async_trait::async_trait;

/// Read access to role records.
#[async_trait]
pub trait RoleStore {
    /// Returns every role, including linked permission ids.
    async fn all_roles(&self) -> std::result::Result<Vec<Role>, StoreError>;

    /// Finds a role by its unique `(name, guard)` pair.
    async fn find_role_by_name(
        &self,
        name: &RoleName,
        guard: &Guard,
    ) -> std::result::Result<Option<Role>, StoreError>;
}

/// Read access to permission records.
#[async_trait]
pub trait PermissionStore {
    /// Returns every permission, including linked role ids.
    async fn all_permissions(&self) -> std::result::Result<Vec<Permission>, StoreError>;

    /// Finds a permission by its unique `(name, guard)` pair.
    async fn find_permission_by_name(
        &self,
        name: &PermissionName,
        guard: &Guard,
    ) -> std::result::Result<Option<Permission>, StoreError>;
}

/// Read access to principal assignments.
#[async_trait]
pub trait PrincipalStore {
    /// Returns roles assigned to a principal.
    async fn principal_roles(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<Role>, StoreError>;

    /// Returns permissions granted directly to a principal.
    async fn principal_permissions(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<Permission>, StoreError>;
}

/// Composite read trait consumed by the engine.
pub trait Store: RoleStore + PermissionStore + PrincipalStore + Send + Sync {}

impl<T> Store for T where T: RoleStore + PermissionStore + PrincipalStore + Send + Sync {}

/// Write access owned by the host's persistence layer.
///
/// Implementations enforce `(name, guard)` uniqueness and remove every link
/// that references a deleted entity. Call these through
/// [`Registry`](crate::Registry) so the permission snapshot is invalidated.
#[async_trait]
pub trait MutationStore: Send + Sync {
    /// Inserts a role. Fails if the `(name, guard)` pair exists.
    async fn insert_role(
        &self,
        name: RoleName,
        guard: Guard,
    ) -> std::result::Result<Role, StoreError>;

    /// Inserts a permission. Fails if the `(name, guard)` pair exists.
    async fn insert_permission(
        &self,
        name: PermissionName,
        guard: Guard,
    ) -> std::result::Result<Permission, StoreError>;

    /// Renames a role.
    async fn rename_role(
        &self,
        role: &RoleId,
        name: RoleName,
    ) -> std::result::Result<Role, StoreError>;

    /// Renames a permission.
    async fn rename_permission(
        &self,
        permission: &PermissionId,
        name: PermissionName,
    ) -> std::result::Result<Permission, StoreError>;

    /// Deletes a role and its links. Returns whether it existed.
    async fn delete_role(&self, role: &RoleId) -> std::result::Result<bool, StoreError>;

    /// Deletes a permission and its links. Returns whether it existed.
    async fn delete_permission(
        &self,
        permission: &PermissionId,
    ) -> std::result::Result<bool, StoreError>;

    /// Links a permission to a role.
    async fn attach_role_permission(
        &self,
        role: &RoleId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError>;

    /// Unlinks a permission from a role.
    async fn detach_role_permission(
        &self,
        role: &RoleId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError>;

    /// Assigns a role to a principal.
    async fn attach_principal_role(
        &self,
        principal: &PrincipalId,
        role: &RoleId,
    ) -> std::result::Result<(), StoreError>;

    /// Removes a role from a principal.
    async fn detach_principal_role(
        &self,
        principal: &PrincipalId,
        role: &RoleId,
    ) -> std::result::Result<(), StoreError>;

    /// Grants a permission directly to a principal.
    async fn attach_principal_permission(
        &self,
        principal: &PrincipalId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError>;

    /// Revokes a directly granted permission from a principal.
    async fn detach_principal_permission(
        &self,
        principal: &PrincipalId,
        permission: &PermissionId,
    ) -> std::result::Result<(), StoreError>;
}
