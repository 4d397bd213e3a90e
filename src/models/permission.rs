//! Role and permission registry
//!
//! The catalog is closed: four permissions and three roles, with a fixed
//! grant table. Migrations provision the same catalog into the database.
//!
//! | role    | permissions               |
//! |---------|---------------------------|
//! | viewer  | view                      |
//! | manager | view, create, edit        |
//! | admin   | view, create, edit, delete|

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// An action a caller may be allowed to perform on posts.
///
/// Ordering follows the catalog order: view, create, edit, delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Create,
    Edit,
    Delete,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::View,
        Permission::Create,
        Permission::Edit,
        Permission::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Create => "create",
            Permission::Edit => "edit",
            Permission::Delete => "delete",
        }
    }

    /// Every permission in the catalog
    pub fn all() -> BTreeSet<Permission> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid permission: {}", s))
    }
}

/// A named bundle of permissions assigned to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Manager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Viewer, Role::Manager, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Permissions granted by this role
    pub fn permissions(&self) -> BTreeSet<Permission> {
        let granted: &[Permission] = match self {
            Role::Viewer => &[Permission::View],
            Role::Manager => &[Permission::View, Permission::Create, Permission::Edit],
            Role::Admin => &Permission::ALL,
        };
        granted.iter().copied().collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid role: {}", s))
    }
}

/// Union of the permissions of every given role
pub fn effective_permissions<'a, I>(roles: I) -> BTreeSet<Permission>
where
    I: IntoIterator<Item = &'a Role>,
{
    roles.into_iter().flat_map(Role::permissions).collect()
}
