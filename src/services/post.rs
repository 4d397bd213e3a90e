//! Post service
//!
//! Every operation runs the same pipeline for the calling [`Identity`]:
//! action gate, lookup, ownership gate, validation, then the mutation.
//! The first failing step decides the outcome.

use crate::db::repositories::PostRepository;
use crate::models::{Identity, ListParams, PagedResult, Permission, PostWithAuthor, RawPostInput, ValidationErrors};
use crate::services::authorizer::{authorize, AuthzError, ListCapabilities, PostCapabilities};
use std::sync::Arc;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("Post not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A page of posts with what the caller may do across the listing
#[derive(Debug, Clone)]
pub struct PostListing {
    pub page: PagedResult<PostWithAuthor>,
    pub capabilities: ListCapabilities,
}

/// A single post with what the caller may do to it
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: PostWithAuthor,
    pub capabilities: PostCapabilities,
}

/// Post service
pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    /// List posts, newest first
    pub async fn list(&self, identity: &Identity, params: ListParams) -> Result<PostListing, PostServiceError> {
        authorize(identity, Permission::View, None)?;

        let (posts, total) = self.repo.list(&params).await?;

        Ok(PostListing {
            page: PagedResult::new(posts, total, &params),
            capabilities: ListCapabilities::for_identity(identity),
        })
    }

    pub async fn show(&self, identity: &Identity, id: i64) -> Result<PostView, PostServiceError> {
        authorize(identity, Permission::View, None)?;

        let post = self.find(id).await?;

        Ok(PostView {
            capabilities: PostCapabilities::for_post(identity, &post.post),
            post,
        })
    }

    /// Create a post owned by the caller
    pub async fn create(&self, identity: &Identity, input: &RawPostInput) -> Result<PostWithAuthor, PostServiceError> {
        authorize(identity, Permission::Create, None)?;

        let input = input.validate().map_err(PostServiceError::Validation)?;
        let post = self.repo.create(identity.user_id(), &input).await?;

        tracing::info!(post_id = post.post.id, user_id = identity.user_id(), "Post created");
        Ok(post)
    }

    /// Replace title, content and publication flag of a post.
    ///
    /// An omitted `is_published` resets the flag to false.
    pub async fn update(
        &self,
        identity: &Identity,
        id: i64,
        input: &RawPostInput,
    ) -> Result<PostWithAuthor, PostServiceError> {
        authorize(identity, Permission::Edit, None)?;

        let existing = self.find(id).await?;
        authorize(identity, Permission::Edit, Some(&existing.post))?;

        let input = input.validate().map_err(PostServiceError::Validation)?;
        let post = self
            .repo
            .update(id, &input)
            .await?
            .ok_or(PostServiceError::NotFound(id))?;

        tracing::info!(post_id = id, user_id = identity.user_id(), "Post updated");
        Ok(post)
    }

    pub async fn delete(&self, identity: &Identity, id: i64) -> Result<(), PostServiceError> {
        authorize(identity, Permission::Delete, None)?;

        let existing = self.find(id).await?;
        authorize(identity, Permission::Delete, Some(&existing.post))?;

        if !self.repo.delete(id).await? {
            return Err(PostServiceError::NotFound(id));
        }

        tracing::info!(post_id = id, user_id = identity.user_id(), "Post deleted");
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<PostWithAuthor, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(PostServiceError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{RoleRepository, SqlxPostRepository, SqlxRoleRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Role, User};
    use serde_json::json;

    async fn setup() -> (DynDatabasePool, PostService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = PostService::new(SqlxPostRepository::boxed(pool.clone()));
        (pool, service)
    }

    async fn identity(pool: &DynDatabasePool, email: &str, role: Role) -> Identity {
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(email.to_string(), email.to_string(), "hash".to_string()))
            .await
            .unwrap();
        SqlxRoleRepository::new(pool.clone())
            .assign(user.id, role)
            .await
            .unwrap();
        Identity::new(user, [role])
    }

    fn body(value: serde_json::Value) -> RawPostInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_show() {
        let (pool, service) = setup().await;
        let manager = identity(&pool, "manager@example.com", Role::Manager).await;

        let created = service
            .create(&manager, &body(json!({"title": "Hello", "content": "World", "is_published": "1"})))
            .await
            .unwrap();
        assert_eq!(created.post.user_id, manager.user_id());
        assert!(created.post.is_published);

        let view = service.show(&manager, created.post.id).await.unwrap();
        assert_eq!(view.post, created);
        assert_eq!(view.capabilities, PostCapabilities { can_edit: true, can_delete: false });
    }

    #[tokio::test]
    async fn test_viewer_cannot_create() {
        let (pool, service) = setup().await;
        let viewer = identity(&pool, "viewer@example.com", Role::Viewer).await;

        let result = service
            .create(&viewer, &body(json!({"title": "T", "content": "C"})))
            .await;
        assert!(matches!(
            result,
            Err(PostServiceError::Forbidden(AuthzError::InsufficientPermission(Permission::Create)))
        ));
    }

    #[tokio::test]
    async fn test_permission_checked_before_validation() {
        let (pool, service) = setup().await;
        let viewer = identity(&pool, "viewer@example.com", Role::Viewer).await;

        let result = service.create(&viewer, &RawPostInput::default()).await;
        assert!(matches!(result, Err(PostServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_unreadable_body_reported_after_gates() {
        let (pool, service) = setup().await;
        let viewer = identity(&pool, "viewer@example.com", Role::Viewer).await;
        let owner = identity(&pool, "manager@example.com", Role::Manager).await;
        let other = identity(&pool, "other@example.com", Role::Manager).await;
        let admin = identity(&pool, "admin@example.com", Role::Admin).await;
        let unreadable = || RawPostInput::rejected(ValidationErrors::single("body", "Expected JSON"));

        assert!(matches!(
            service.create(&viewer, &unreadable()).await,
            Err(PostServiceError::Forbidden(_))
        ));

        let post = service
            .create(&owner, &body(json!({"title": "T", "content": "C"})))
            .await
            .unwrap();
        assert!(matches!(
            service.update(&other, post.post.id, &unreadable()).await,
            Err(PostServiceError::Forbidden(AuthzError::NotOwner(Permission::Edit)))
        ));
        assert!(matches!(
            service.update(&admin, 999, &unreadable()).await,
            Err(PostServiceError::NotFound(999))
        ));

        match service.update(&owner, post.post.id, &unreadable()).await {
            Err(PostServiceError::Validation(errors)) => assert!(errors.get("body").is_some()),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (pool, service) = setup().await;
        let manager = identity(&pool, "manager@example.com", Role::Manager).await;

        match service.create(&manager, &body(json!({"title": "  ", "content": 5}))).await {
            Err(PostServiceError::Validation(errors)) => {
                assert!(errors.get("title").is_some());
                assert!(errors.get("content").is_some());
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_manager_updates_only_own_post() {
        let (pool, service) = setup().await;
        let owner = identity(&pool, "manager@example.com", Role::Manager).await;
        let other = identity(&pool, "other@example.com", Role::Manager).await;

        let post = service
            .create(&owner, &body(json!({"title": "T", "content": "C", "is_published": true})))
            .await
            .unwrap();

        let updated = service
            .update(&owner, post.post.id, &body(json!({"title": "T2", "content": "C2"})))
            .await
            .unwrap();
        assert_eq!(updated.post.title, "T2");
        assert!(!updated.post.is_published);

        let denied = service
            .update(&other, post.post.id, &body(json!({"title": "X", "content": "Y"})))
            .await;
        assert!(matches!(
            denied,
            Err(PostServiceError::Forbidden(AuthzError::NotOwner(Permission::Edit)))
        ));
    }

    #[tokio::test]
    async fn test_ownership_checked_before_validation() {
        let (pool, service) = setup().await;
        let owner = identity(&pool, "manager@example.com", Role::Manager).await;
        let other = identity(&pool, "other@example.com", Role::Manager).await;
        let post = service
            .create(&owner, &body(json!({"title": "T", "content": "C"})))
            .await
            .unwrap();

        let result = service.update(&other, post.post.id, &RawPostInput::default()).await;
        assert!(matches!(result, Err(PostServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_missing_post_is_not_found_for_permitted_caller() {
        let (pool, service) = setup().await;
        let admin = identity(&pool, "admin@example.com", Role::Admin).await;
        let viewer = identity(&pool, "viewer@example.com", Role::Viewer).await;

        assert!(matches!(service.show(&admin, 999).await, Err(PostServiceError::NotFound(999))));
        assert!(matches!(
            service.update(&admin, 999, &RawPostInput::default()).await,
            Err(PostServiceError::NotFound(999))
        ));
        // Action gate runs before lookup
        assert!(matches!(service.delete(&viewer, 999).await, Err(PostServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_admin_deletes_others_post_once() {
        let (pool, service) = setup().await;
        let manager = identity(&pool, "manager@example.com", Role::Manager).await;
        let admin = identity(&pool, "admin@example.com", Role::Admin).await;
        let post = service
            .create(&manager, &body(json!({"title": "T", "content": "C"})))
            .await
            .unwrap();

        service.delete(&admin, post.post.id).await.unwrap();
        assert!(matches!(
            service.delete(&admin, post.post.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pages_and_capabilities() {
        let (pool, service) = setup().await;
        let admin = identity(&pool, "admin@example.com", Role::Admin).await;
        let viewer = identity(&pool, "viewer@example.com", Role::Viewer).await;

        for i in 0..15 {
            service
                .create(&admin, &body(json!({"title": format!("Post {}", i), "content": "C"})))
                .await
                .unwrap();
        }

        let listing = service.list(&viewer, ListParams::new(2, 10)).await.unwrap();
        assert_eq!(listing.page.data.len(), 5);
        assert_eq!(listing.page.last_page, 2);
        assert_eq!(listing.page.total, 15);
        assert_eq!(
            listing.capabilities,
            ListCapabilities { can_create: false, can_edit: false, can_delete: false }
        );
    }
}
