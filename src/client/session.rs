//! Client-side session state
//!
//! The [`SessionManager`] keeps the logged-in identity in memory and mirrors
//! it into a [`SessionStore`] so that it survives restarts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{Permission, Role, User};

/// What the client remembers about a login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSession {
    pub token: String,
    pub user: User,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

/// Persistence for the client session
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<ClientSession>>;

    async fn save(&self, session: &ClientSession) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Store that forgets everything when dropped
#[derive(Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<ClientSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<ClientSession>> {
        Ok(self.session.read().await.clone())
    }

    async fn save(&self, session: &ClientSession) -> Result<()> {
        *self.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.write().await = None;
        Ok(())
    }
}

/// Store backed by a JSON file
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    /// A missing file means no session. An unreadable one is discarded.
    async fn load(&self) -> Result<Option<ClientSession>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read session file {:?}", self.path))
            }
        };

        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Ignoring corrupt session file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &ClientSession) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write session file {:?}", self.path))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove session file {:?}", self.path)),
        }
    }
}

/// Current session, held behind an async lock and mirrored to a store
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<ClientSession>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Pull the persisted session into memory
    pub async fn load(&self) -> Result<Option<ClientSession>> {
        let session = self.store.load().await?;
        *self.current.write().await = session.clone();
        Ok(session)
    }

    pub async fn current(&self) -> Option<ClientSession> {
        self.current.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn set(&self, session: ClientSession) -> Result<()> {
        let mut current = self.current.write().await;
        self.store.save(&session).await?;
        *current = Some(session);
        Ok(())
    }

    /// Replace user, roles and permissions, keeping the token
    pub async fn refresh_identity(
        &self,
        user: User,
        roles: BTreeSet<Role>,
        permissions: BTreeSet<Permission>,
    ) -> Result<Option<ClientSession>> {
        let refreshed = {
            let mut current = self.current.write().await;
            match current.as_mut() {
                Some(session) => {
                    session.user = user;
                    session.roles = roles;
                    session.permissions = permissions;
                    Some(session.clone())
                }
                None => None,
            }
        };

        if let Some(session) = &refreshed {
            self.store.save(session).await?;
        }
        Ok(refreshed)
    }

    /// Forget the session. In-memory state is always cleared, even if the
    /// store fails.
    pub async fn clear(&self) {
        *self.current.write().await = None;
        if let Err(e) = self.store.clear().await {
            tracing::warn!("Failed to clear stored session: {:#}", e);
        }
    }

    /// Forget the session only if it still holds `token`.
    ///
    /// Returns whether anything was cleared. A session stored after `token`
    /// was sent is left alone.
    pub async fn clear_if_token(&self, token: &str) -> bool {
        let mut current = self.current.write().await;
        if current.as_ref().map(|s| s.token.as_str()) != Some(token) {
            return false;
        }

        *current = None;
        if let Err(e) = self.store.clear().await {
            tracing::warn!("Failed to clear stored session: {:#}", e);
        }
        true
    }

    pub async fn has_permission(&self, permission: Permission) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.permissions.contains(&permission))
    }

    pub async fn has_role(&self, role: Role) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.roles.contains(&role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> ClientSession {
        let mut user = User::new("Manager User".to_string(), "manager@example.com".to_string(), String::new());
        user.id = 2;
        ClientSession {
            token: "a".repeat(64),
            user,
            roles: BTreeSet::from([Role::Manager]),
            permissions: Role::Manager.permissions(),
        }
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().await.unwrap().is_none());

        store.save(&session()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session()));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_ignores_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(FileSessionStore::new(path).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_session_has_no_password_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let mut stored = session();
        stored.user.password_hash = "$argon2id$secret".to_string();

        FileSessionStore::new(&path).save(&stored).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("argon2id"));
    }

    #[tokio::test]
    async fn test_manager_permission_checks() {
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()));
        assert!(!manager.has_permission(Permission::View).await);

        manager.set(session()).await.unwrap();
        assert!(manager.is_authenticated().await);
        assert!(manager.has_permission(Permission::Edit).await);
        assert!(!manager.has_permission(Permission::Delete).await);
        assert!(manager.has_role(Role::Manager).await);
        assert!(!manager.has_role(Role::Admin).await);

        manager.clear().await;
        assert!(!manager.is_authenticated().await);
        assert!(!manager.has_permission(Permission::View).await);
    }

    #[tokio::test]
    async fn test_manager_loads_from_store() {
        let store = Arc::new(MemorySessionStore::new());
        store.save(&session()).await.unwrap();

        let manager = SessionManager::new(store.clone());
        assert!(manager.token().await.is_none());

        manager.load().await.unwrap();
        assert_eq!(manager.token().await, Some("a".repeat(64)));

        manager.clear().await;
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_if_token_spares_newer_session() {
        let store = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(store.clone());
        let mut newer = session();
        newer.token = "c".repeat(64);
        manager.set(newer.clone()).await.unwrap();

        assert!(!manager.clear_if_token(&"a".repeat(64)).await);
        assert_eq!(manager.current().await, Some(newer.clone()));
        assert_eq!(store.load().await.unwrap(), Some(newer));

        assert!(manager.clear_if_token(&"c".repeat(64)).await);
        assert!(!manager.is_authenticated().await);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_identity_keeps_token() {
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()));
        assert!(manager
            .refresh_identity(session().user, BTreeSet::new(), BTreeSet::new())
            .await
            .unwrap()
            .is_none());

        manager.set(session()).await.unwrap();
        let refreshed = manager
            .refresh_identity(session().user, BTreeSet::from([Role::Admin]), Permission::all())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(refreshed.token, "a".repeat(64));
        assert!(manager.has_role(Role::Admin).await);
        assert!(manager.has_permission(Permission::Delete).await);
    }
}
