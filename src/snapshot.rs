use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::model::{Permission, Role};
use crate::types::{Guard, PermissionId, PermissionName, RoleId, RoleName};

/// Immutable point-in-time copy of the role/permission graph.
///
/// Built from the full role and permission listings of a store and indexed
/// for constant-time lookup by id and by `(name, guard)`. A snapshot is
/// never mutated after construction; the cache replaces it wholesale.
#[derive(Debug)]
pub struct PermissionSnapshot {
    generation: u64,
    built_at: Instant,
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    roles_by_name: HashMap<Guard, HashMap<RoleName, RoleId>>,
    permissions_by_name: HashMap<Guard, HashMap<PermissionName, PermissionId>>,
    role_permissions: HashMap<RoleId, HashSet<PermissionId>>,
}

impl PermissionSnapshot {
    /// Builds a snapshot tagged with the invalidation generation it reflects.
    ///
    /// Edges are the union of [`Role::permissions`] and [`Permission::roles`];
    /// edges pointing at ids missing from either listing are dropped.
    pub fn build(generation: u64, roles: Vec<Role>, permissions: Vec<Permission>) -> Self {
        let mut roles_by_name: HashMap<Guard, HashMap<RoleName, RoleId>> = HashMap::new();
        let mut role_map = HashMap::with_capacity(roles.len());
        for role in roles {
            roles_by_name
                .entry(role.guard.clone())
                .or_default()
                .insert(role.name.clone(), role.id.clone());
            role_map.insert(role.id.clone(), role);
        }

        let mut permissions_by_name: HashMap<Guard, HashMap<PermissionName, PermissionId>> =
            HashMap::new();
        let mut permission_map = HashMap::with_capacity(permissions.len());
        for permission in permissions {
            permissions_by_name
                .entry(permission.guard.clone())
                .or_default()
                .insert(permission.name.clone(), permission.id.clone());
            permission_map.insert(permission.id.clone(), permission);
        }

        let mut role_permissions: HashMap<RoleId, HashSet<PermissionId>> = HashMap::new();
        for role in role_map.values() {
            for permission in &role.permissions {
                if permission_map.contains_key(permission) {
                    role_permissions
                        .entry(role.id.clone())
                        .or_default()
                        .insert(permission.clone());
                }
            }
        }
        for permission in permission_map.values() {
            for role in &permission.roles {
                if role_map.contains_key(role) {
                    role_permissions
                        .entry(role.clone())
                        .or_default()
                        .insert(permission.id.clone());
                }
            }
        }

        Self {
            generation,
            built_at: Instant::now(),
            roles: role_map,
            permissions: permission_map,
            roles_by_name,
            permissions_by_name,
            role_permissions,
        }
    }

    /// Invalidation generation this snapshot was built for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Build time.
    pub fn built_at(&self) -> Instant {
        self.built_at
    }

    /// Finds a role by `(name, guard)`.
    pub fn find_role(&self, name: &str, guard: &Guard) -> Option<&Role> {
        let id = self.roles_by_name.get(guard)?.get(name)?;
        self.roles.get(id)
    }

    /// Finds a permission by `(name, guard)`.
    pub fn find_permission(&self, name: &str, guard: &Guard) -> Option<&Permission> {
        let id = self.permissions_by_name.get(guard)?.get(name)?;
        self.permissions.get(id)
    }

    /// Returns a role by id.
    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    /// Returns a permission by id.
    pub fn permission(&self, id: &PermissionId) -> Option<&Permission> {
        self.permissions.get(id)
    }

    /// Returns the permissions granted by a role. Unknown roles grant nothing.
    pub fn permissions_of_role<'a>(
        &'a self,
        role: &RoleId,
    ) -> impl Iterator<Item = &'a Permission> + use<'a> {
        self.role_permissions
            .get(role)
            .into_iter()
            .flatten()
            .filter_map(|id| self.permissions.get(id))
    }

    /// Returns whether `role` grants `permission`.
    pub fn role_grants(&self, role: &RoleId, permission: &PermissionId) -> bool {
        self.role_permissions
            .get(role)
            .is_some_and(|granted| granted.contains(permission))
    }

    /// Iterates all roles.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Iterates all permissions.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    /// Number of roles.
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Number of permissions.
    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(value: &str) -> Guard {
        Guard::try_from(value).unwrap()
    }

    fn role(id: &str, name: &str, guard_name: &str, perms: &[&str]) -> Role {
        let mut role = Role::new(
            RoleId::try_from(id).unwrap(),
            RoleName::try_from(name).unwrap(),
            guard(guard_name),
        );
        role.permissions = perms
            .iter()
            .map(|p| PermissionId::try_from(*p).unwrap())
            .collect();
        role
    }

    fn permission(id: &str, name: &str, guard_name: &str) -> Permission {
        Permission::new(
            PermissionId::try_from(id).unwrap(),
            PermissionName::try_from(name).unwrap(),
            guard(guard_name),
        )
    }

    #[test]
    fn lookup_by_name_is_guard_scoped() {
        let snapshot = PermissionSnapshot::build(
            0,
            vec![
                role("r1", "editor", "web", &[]),
                role("r2", "editor", "api", &[]),
            ],
            vec![permission("p1", "publish", "web")],
        );

        assert_eq!(
            snapshot.find_role("editor", &guard("api")).unwrap().id.as_str(),
            "r2"
        );
        assert!(snapshot.find_permission("publish", &guard("api")).is_none());
        assert!(snapshot.find_permission("publish", &guard("web")).is_some());
    }

    #[test]
    fn edges_merge_both_sides_and_drop_dangling_ids() {
        let mut publish = permission("p2", "publish", "web");
        publish.roles = vec![RoleId::try_from("r1").unwrap()];
        let snapshot = PermissionSnapshot::build(
            3,
            vec![role("r1", "editor", "web", &["p1", "missing"])],
            vec![permission("p1", "edit", "web"), publish],
        );

        let r1 = RoleId::try_from("r1").unwrap();
        let mut names: Vec<&str> = snapshot
            .permissions_of_role(&r1)
            .map(|p| p.name.as_str())
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["edit", "publish"]);
        assert!(!snapshot.role_grants(&r1, &PermissionId::try_from("missing").unwrap()));
        assert_eq!(snapshot.generation(), 3);
    }

    #[test]
    fn unknown_role_has_no_permissions() {
        let snapshot = PermissionSnapshot::build(0, Vec::new(), Vec::new());
        let ghost = RoleId::try_from("ghost").unwrap();
        assert_eq!(snapshot.permissions_of_role(&ghost).count(), 0);
    }
}
