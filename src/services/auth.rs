//! Authentication service
//!
//! Verifies credentials, issues opaque bearer tokens and resolves them back
//! into an [`Identity`] on every request.
//!
//! Tokens are 32 random bytes from the OS CSPRNG, hex encoded (64 chars).
//! Only their SHA-256 digest is stored, as the session id.

use crate::db::repositories::{RoleRepository, SessionRepository, UserRepository};
use crate::models::{Identity, Permission, Role, Session, User, ValidationErrors};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{Duration, Utc};
use data_encoding::HEXLOWER;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Message shown for any failed credential check
pub const INVALID_CREDENTIALS: &str = "The provided credentials are incorrect.";

const TOKEN_BYTES: usize = 32;

/// Hash verified against when the email is unknown, so that both failure
/// paths cost one argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("postguard-dummy-password").ok());

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{}", INVALID_CREDENTIALS)]
    InvalidCredentials,

    /// Token absent, malformed, unknown, expired, or its user is gone
    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Login request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn validate(&self) -> Result<(&str, &str), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        match email {
            None => errors.add("email", "The email field is required."),
            Some(email) if !looks_like_email(email) => {
                errors.add("email", "The email field must be a valid email address.")
            }
            Some(_) => {}
        }

        let password = self.password.as_deref().filter(|p| !p.is_empty());
        if password.is_none() {
            errors.add("password", "The password field is required.");
        }

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok((email, password)),
            _ => Err(errors),
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Successful login: the plaintext token is only ever returned here
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub user: User,
    pub token: String,
    pub permissions: BTreeSet<Permission>,
    pub roles: BTreeSet<Role>,
}

/// Authentication service
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    role_repo: Arc<dyn RoleRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_ttl: Option<Duration>,
}

impl AuthService {
    /// Sessions created by this service never expire.
    ///
    /// Builds the dummy hash up front so the first unknown-email login costs
    /// the same as any other.
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Lazy::force(&DUMMY_HASH);
        Self {
            user_repo,
            role_repo,
            session_repo,
            session_ttl: None,
        }
    }

    /// Expire sessions `ttl` after login
    pub fn with_session_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl
    }

    /// Verify credentials and open a new session.
    ///
    /// # Errors
    ///
    /// - `Validation` if email or password is missing or malformed
    /// - `InvalidCredentials` if no user has the email or the password is wrong
    pub async fn login(&self, input: &LoginInput) -> Result<LoginResult, AuthServiceError> {
        let (email, password) = input.validate().map_err(AuthServiceError::Validation)?;

        let user = match self.user_repo.get_by_email(email).await? {
            Some(user) => user,
            None => {
                if let Some(dummy) = DUMMY_HASH.as_deref() {
                    let _ = verify_password(password, dummy);
                }
                return Err(AuthServiceError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            return Err(AuthServiceError::InvalidCredentials);
        }

        let token = self.create_session(user.id).await?;
        let roles = self.role_repo.roles_for_user(user.id).await?;
        let identity = Identity::new(user, roles);

        Ok(LoginResult {
            permissions: identity.permissions(),
            roles: identity.roles,
            user: identity.user,
            token,
        })
    }

    /// Resolve a bearer token to the identity behind it.
    ///
    /// Expired sessions are deleted on sight.
    pub async fn resolve_session(&self, token: &str) -> Result<Identity, AuthServiceError> {
        if !is_well_formed_token(token) {
            return Err(AuthServiceError::Unauthenticated);
        }

        let digest = token_digest(token);
        let session = self
            .session_repo
            .get_by_id(&digest)
            .await?
            .ok_or(AuthServiceError::Unauthenticated)?;

        if session.is_expired() {
            self.session_repo.delete(&digest).await?;
            return Err(AuthServiceError::Unauthenticated);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await?
            .ok_or(AuthServiceError::Unauthenticated)?;
        let roles = self.role_repo.roles_for_user(user.id).await?;

        Ok(Identity::new(user, roles))
    }

    /// Revoke the session behind `token`, and only that one.
    pub async fn logout(&self, token: &str) -> Result<Identity, AuthServiceError> {
        let identity = self.resolve_session(token).await?;
        self.session_repo.delete(&token_digest(token)).await?;
        Ok(identity)
    }

    /// Delete all expired sessions; returns how many were removed
    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthServiceError> {
        Ok(self.session_repo.delete_expired().await?)
    }

    async fn create_session(&self, user_id: i64) -> Result<String, AuthServiceError> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = match self.session_ttl {
            Some(ttl) => Some(
                now.checked_add_signed(ttl)
                    .context("Session expiry is out of range")?,
            ),
            None => None,
        };
        let session = Session {
            id: token_digest(&token),
            user_id,
            expires_at,
            created_at: now,
        };

        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(token)
    }
}

/// 32 random bytes, lowercase hex
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}

/// SHA-256 of the token, lowercase hex; this is what gets persisted
pub fn token_digest(token: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
}

pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxRoleRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, AuthService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxRoleRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    async fn create_user(pool: &DynDatabasePool, email: &str, roles: &[Role]) -> User {
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "Test User".to_string(),
                email.to_string(),
                hash_password("password").unwrap(),
            ))
            .await
            .unwrap();
        let role_repo = SqlxRoleRepository::new(pool.clone());
        for role in roles {
            role_repo.assign(user.id, *role).await.unwrap();
        }
        user
    }

    #[tokio::test]
    async fn test_login_returns_token_roles_and_permissions() {
        let (pool, service) = setup().await;
        let user = create_user(&pool, "manager@example.com", &[Role::Manager]).await;

        let result = service
            .login(&LoginInput::new("manager@example.com", "password"))
            .await
            .expect("Login should succeed");

        assert_eq!(result.user.id, user.id);
        assert!(is_well_formed_token(&result.token));
        assert_eq!(result.roles, BTreeSet::from([Role::Manager]));
        assert_eq!(
            result.permissions,
            BTreeSet::from([Permission::View, Permission::Create, Permission::Edit])
        );
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (pool, service) = setup().await;
        create_user(&pool, "viewer@example.com", &[Role::Viewer]).await;

        let result = service.login(&LoginInput::new("viewer@example.com", "wrong")).await;
        assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email_and_case_sensitivity() {
        let (pool, service) = setup().await;
        create_user(&pool, "viewer@example.com", &[Role::Viewer]).await;

        let unknown = service.login(&LoginInput::new("nobody@example.com", "password")).await;
        assert!(matches!(unknown, Err(AuthServiceError::InvalidCredentials)));

        let other_case = service.login(&LoginInput::new("Viewer@example.com", "password")).await;
        assert!(matches!(other_case, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_validation() {
        let (_pool, service) = setup().await;

        match service.login(&LoginInput::default()).await {
            Err(AuthServiceError::Validation(errors)) => {
                assert_eq!(errors.get("email").unwrap(), &["The email field is required.".to_string()]);
                assert_eq!(
                    errors.get("password").unwrap(),
                    &["The password field is required.".to_string()]
                );
            }
            other => panic!("Expected validation error, got {:?}", other),
        }

        match service.login(&LoginInput::new("not-an-email", "password")).await {
            Err(AuthServiceError::Validation(errors)) => assert!(errors.get("email").is_some()),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_resolves_until_logout() {
        let (pool, service) = setup().await;
        let user = create_user(&pool, "admin@example.com", &[Role::Admin]).await;

        let token = service
            .login(&LoginInput::new("admin@example.com", "password"))
            .await
            .unwrap()
            .token;

        for _ in 0..3 {
            let identity = service.resolve_session(&token).await.unwrap();
            assert_eq!(identity.user.id, user.id);
            assert!(identity.is_admin());
        }

        service.logout(&token).await.unwrap();

        assert!(matches!(
            service.resolve_session(&token).await,
            Err(AuthServiceError::Unauthenticated)
        ));
        assert!(matches!(service.logout(&token).await, Err(AuthServiceError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (pool, service) = setup().await;
        create_user(&pool, "admin@example.com", &[Role::Admin]).await;
        let input = LoginInput::new("admin@example.com", "password");

        let first = service.login(&input).await.unwrap().token;
        let second = service.login(&input).await.unwrap().token;
        assert_ne!(first, second);

        service.logout(&first).await.unwrap();
        assert!(service.resolve_session(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_token_not_stored_in_plaintext() {
        let (pool, service) = setup().await;
        create_user(&pool, "admin@example.com", &[Role::Admin]).await;

        let token = service
            .login(&LoginInput::new("admin@example.com", "password"))
            .await
            .unwrap()
            .token;

        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM sessions")
            .fetch_all(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(ids, vec![token_digest(&token)]);
        assert!(!ids.contains(&token));
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_tokens_rejected() {
        let (_pool, service) = setup().await;

        let tokens = [
            String::new(),
            "abc".to_string(),
            "A".repeat(64),
            "g".repeat(64),
            generate_token(),
        ];
        for token in &tokens {
            assert!(matches!(
                service.resolve_session(token).await,
                Err(AuthServiceError::Unauthenticated)
            ));
        }
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_removed() {
        let (pool, service) = setup().await;
        create_user(&pool, "admin@example.com", &[Role::Admin]).await;
        let service = service.with_session_ttl(Some(Duration::seconds(-1)));

        let token = service
            .login(&LoginInput::new("admin@example.com", "password"))
            .await
            .unwrap()
            .token;

        assert!(matches!(
            service.resolve_session(&token).await,
            Err(AuthServiceError::Unauthenticated)
        ));
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_purge_expired_sessions() {
        let (pool, service) = setup().await;
        create_user(&pool, "admin@example.com", &[Role::Admin]).await;
        let input = LoginInput::new("admin@example.com", "password");

        let expiring = service.with_session_ttl(Some(Duration::seconds(-1)));
        expiring.login(&input).await.unwrap();
        expiring.login(&input).await.unwrap();

        assert_eq!(expiring.purge_expired_sessions().await.unwrap(), 2);
        assert_eq!(expiring.purge_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dummy_hash_ready_after_construction() {
        let (_pool, _service) = setup().await;
        assert!(Lazy::get(&DUMMY_HASH).is_some());
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_is_internal_error() {
        let (pool, service) = setup().await;
        create_user(&pool, "admin@example.com", &[Role::Admin]).await;
        let service = service.with_session_ttl(Some(Duration::days(100_000_000)));

        let result = service
            .login(&LoginInput::new("admin@example.com", "password"))
            .await;
        assert!(matches!(result, Err(AuthServiceError::Internal(_))));
    }

    #[tokio::test]
    async fn test_deleted_user_token_rejected() {
        let (pool, service) = setup().await;
        let user = create_user(&pool, "admin@example.com", &[Role::Admin]).await;
        let token = service
            .login(&LoginInput::new("admin@example.com", "password"))
            .await
            .unwrap()
            .token;

        SqlxUserRepository::new(pool.clone()).delete(user.id).await.unwrap();

        assert!(matches!(
            service.resolve_session(&token).await,
            Err(AuthServiceError::Unauthenticated)
        ));
    }

    #[test]
    fn test_token_format() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(is_well_formed_token(&token));
        assert_ne!(token, generate_token());

        let digest = token_digest(&token);
        assert!(is_well_formed_token(&digest));
        assert_ne!(digest, token);
    }
}
