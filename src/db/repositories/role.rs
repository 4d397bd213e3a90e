//! Role repository
//!
//! Role assignments (`user_roles`) and read access to the provisioned
//! role/permission catalog.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Permission, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

/// Stored catalog: role name to granted permission names
pub type Catalog = BTreeMap<String, BTreeSet<String>>;

/// Role repository trait
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Assign a role to a user. Returns false if it was already assigned.
    async fn assign(&self, user_id: i64, role: Role) -> Result<bool>;

    /// Roles currently assigned to a user
    async fn roles_for_user(&self, user_id: i64) -> Result<BTreeSet<Role>>;

    /// The role/permission catalog as stored in the database
    async fn catalog(&self) -> Result<Catalog>;
}

/// SQLx-based role repository for SQLite and MySQL
pub struct SqlxRoleRepository {
    pool: DynDatabasePool,
}

impl SqlxRoleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RoleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RoleRepository for SqlxRoleRepository {
    async fn assign(&self, user_id: i64, role: Role) -> Result<bool> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => assign_role_sqlite(pool, user_id, role).await,
            Backend::Mysql(pool) => assign_role_mysql(pool, user_id, role).await,
        }
    }

    async fn roles_for_user(&self, user_id: i64) -> Result<BTreeSet<Role>> {
        let names = match self.pool.backend()? {
            Backend::Sqlite(pool) => role_names_for_user_sqlite(pool, user_id).await?,
            Backend::Mysql(pool) => role_names_for_user_mysql(pool, user_id).await?,
        };

        let mut roles = BTreeSet::new();
        for name in names {
            match Role::from_str(&name) {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(_) => tracing::warn!("Ignoring unknown role '{}' assigned to user {}", name, user_id),
            }
        }
        Ok(roles)
    }

    async fn catalog(&self) -> Result<Catalog> {
        let pairs = match self.pool.backend()? {
            Backend::Sqlite(pool) => catalog_sqlite(pool).await?,
            Backend::Mysql(pool) => catalog_mysql(pool).await?,
        };

        let mut catalog = Catalog::new();
        for (role, permission) in pairs {
            let granted = catalog.entry(role).or_default();
            if let Some(permission) = permission {
                granted.insert(permission);
            }
        }
        Ok(catalog)
    }
}

/// The catalog the registry defines, in stored form
pub fn expected_catalog() -> Catalog {
    Role::ALL
        .iter()
        .map(|role| {
            let permissions: BTreeSet<String> =
                role.permissions().iter().map(|p| p.to_string()).collect();
            (role.to_string(), permissions)
        })
        .collect()
}

/// Differences between the stored catalog and the registry.
///
/// An empty result means the database matches.
pub fn catalog_drift(stored: &Catalog) -> Vec<String> {
    let expected = expected_catalog();
    let mut drift = Vec::new();

    for (role, permissions) in &expected {
        match stored.get(role) {
            None => drift.push(format!("role '{}' is missing", role)),
            Some(found) if found != permissions => drift.push(format!(
                "role '{}' grants [{}], expected [{}]",
                role,
                join(found),
                join(permissions)
            )),
            Some(_) => {}
        }
    }
    for role in stored.keys().filter(|role| !expected.contains_key(*role)) {
        drift.push(format!("unknown role '{}'", role));
    }
    for permission in stored.values().flatten() {
        if Permission::from_str(permission).is_err() {
            drift.push(format!("unknown permission '{}'", permission));
        }
    }

    drift.sort();
    drift.dedup();
    drift
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

const CATALOG_QUERY: &str = r#"
    SELECT r.name AS role, p.name AS permission
    FROM roles r
    LEFT JOIN role_permissions rp ON rp.role_id = r.id
    LEFT JOIN permissions p ON p.id = rp.permission_id
    ORDER BY r.name, p.name
"#;

const ROLES_FOR_USER_QUERY: &str = r#"
    SELECT r.name AS name
    FROM user_roles ur
    JOIN roles r ON r.id = ur.role_id
    WHERE ur.user_id = ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn assign_role_sqlite(pool: &SqlitePool, user_id: i64, role: Role) -> Result<bool> {
    let role_id: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(role.as_str())
        .fetch_optional(pool)
        .await
        .context("Failed to look up role")?;
    let role_id = role_id.with_context(|| format!("Role '{}' is not provisioned", role))?;

    let result = sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await
        .context("Failed to assign role")?;

    Ok(result.rows_affected() > 0)
}

async fn role_names_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(ROLES_FOR_USER_QUERY)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to load user roles")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn catalog_sqlite(pool: &SqlitePool) -> Result<Vec<(String, Option<String>)>> {
    let rows = sqlx::query(CATALOG_QUERY)
        .fetch_all(pool)
        .await
        .context("Failed to load role catalog")?;

    Ok(rows
        .iter()
        .map(|row| (row.get("role"), row.get("permission")))
        .collect())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn assign_role_mysql(pool: &MySqlPool, user_id: i64, role: Role) -> Result<bool> {
    let role_id: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(role.as_str())
        .fetch_optional(pool)
        .await
        .context("Failed to look up role")?;
    let role_id = role_id.with_context(|| format!("Role '{}' is not provisioned", role))?;

    let result = sqlx::query("INSERT IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await
        .context("Failed to assign role")?;

    Ok(result.rows_affected() > 0)
}

async fn role_names_for_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query(ROLES_FOR_USER_QUERY)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to load user roles")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

async fn catalog_mysql(pool: &MySqlPool) -> Result<Vec<(String, Option<String>)>> {
    let rows = sqlx::query(CATALOG_QUERY)
        .fetch_all(pool)
        .await
        .context("Failed to load role catalog")?;

    Ok(rows
        .iter()
        .map(|row| (row.get("role"), row.get("permission")))
        .collect())
}
