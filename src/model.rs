use crate::types::{Guard, PermissionId, PermissionName, RoleId, RoleName};

/// Role record as returned by the store.
///
/// `permissions` lists the permissions linked to this role. The snapshot
/// merges it with [`Permission::roles`], so a store may populate either side.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Role {
    /// Store identifier.
    pub id: RoleId,
    /// Role name.
    pub name: RoleName,
    /// Guard the role belongs to.
    pub guard: Guard,
    /// Linked permissions.
    #[cfg_attr(feature = "serde", serde(default))]
    pub permissions: Vec<PermissionId>,
}

impl Role {
    /// Creates a role without linked permissions.
    pub fn new(id: RoleId, name: RoleName, guard: Guard) -> Self {
        Self {
            id,
            name,
            guard,
            permissions: Vec::new(),
        }
    }
}

/// Permission record as returned by the store.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permission {
    /// Store identifier.
    pub id: PermissionId,
    /// Permission name.
    pub name: PermissionName,
    /// Guard the permission belongs to.
    pub guard: Guard,
    /// Roles granting this permission.
    #[cfg_attr(feature = "serde", serde(default))]
    pub roles: Vec<RoleId>,
}

impl Permission {
    /// Creates a permission without linked roles.
    pub fn new(id: PermissionId, name: PermissionName, guard: Guard) -> Self {
        Self {
            id,
            name,
            guard,
            roles: Vec::new(),
        }
    }
}

/// Reference to a permission: either a resolved record or a name to look up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionRef {
    /// A record already loaded from the store.
    Entity(Permission),
    /// A name; `None` guard means the engine's default guard.
    Named {
        name: PermissionName,
        guard: Option<Guard>,
    },
}

impl PermissionRef {
    /// Creates a named reference within a guard.
    pub fn named(name: PermissionName, guard: Guard) -> Self {
        Self::Named {
            name,
            guard: Some(guard),
        }
    }
}

impl From<Permission> for PermissionRef {
    fn from(value: Permission) -> Self {
        Self::Entity(value)
    }
}

impl From<&Permission> for PermissionRef {
    fn from(value: &Permission) -> Self {
        Self::Entity(value.clone())
    }
}

impl From<PermissionName> for PermissionRef {
    fn from(name: PermissionName) -> Self {
        Self::Named { name, guard: None }
    }
}

/// Reference to a role: either a resolved record or a name to look up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoleRef {
    /// A record already loaded from the store.
    Entity(Role),
    /// A name; `None` guard means the engine's default guard.
    Named {
        name: RoleName,
        guard: Option<Guard>,
    },
}

impl RoleRef {
    /// Creates a named reference within a guard.
    pub fn named(name: RoleName, guard: Guard) -> Self {
        Self::Named {
            name,
            guard: Some(guard),
        }
    }
}

impl From<Role> for RoleRef {
    fn from(value: Role) -> Self {
        Self::Entity(value)
    }
}

impl From<&Role> for RoleRef {
    fn from(value: &Role) -> Self {
        Self::Entity(value.clone())
    }
}

impl From<RoleName> for RoleRef {
    fn from(name: RoleName) -> Self {
        Self::Named { name, guard: None }
    }
}
