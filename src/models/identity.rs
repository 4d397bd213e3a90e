//! Resolved caller identity

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::permission::{effective_permissions, Permission, Role};
use super::user::User;

/// The user behind a request together with the roles assigned to them.
///
/// Built fresh for every request from the bearer token; never cached
/// across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user: User,
    pub roles: BTreeSet<Role>,
}

impl Identity {
    pub fn new(user: User, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    /// Effective permission set (union over all assigned roles)
    pub fn permissions(&self) -> BTreeSet<Permission> {
        effective_permissions(&self.roles)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.roles.iter().any(|role| role.permissions().contains(&permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(roles: &[Role]) -> Identity {
        let user = User::new("Test".to_string(), "test@example.com".to_string(), String::new());
        Identity::new(user, roles.iter().copied())
    }

    #[test]
    fn test_identity_without_roles_can_nothing() {
        let id = identity(&[]);
        assert!(id.permissions().is_empty());
        assert!(Permission::ALL.iter().all(|p| !id.can(*p)));
    }

    #[test]
    fn test_manager_permissions() {
        let id = identity(&[Role::Manager]);
        assert!(id.can(Permission::Edit));
        assert!(!id.can(Permission::Delete));
        assert!(!id.is_admin());
    }

    #[test]
    fn test_multiple_roles_union() {
        let id = identity(&[Role::Viewer, Role::Admin]);
        assert_eq!(id.permissions(), Permission::all());
        assert!(id.has_role(Role::Viewer));
        assert!(id.is_admin());
    }
}
