//! Authorization decisions
//!
//! Two gates, both of which must pass:
//!
//! 1. Action gate: the action must be in the caller's effective permission
//!    set (union over their roles).
//! 2. Ownership gate, for edit and delete of an existing post only: the
//!    caller must hold the admin role or be the post's author.
//!
//! View and create have no resource gate.

use serde::{Deserialize, Serialize};

use crate::models::{Identity, Permission, Post};

/// Why an action was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("You do not have permission to {0} posts.")]
    InsufficientPermission(Permission),

    #[error("You can only {0} your own posts.")]
    NotOwner(Permission),
}

/// Decide whether `identity` may perform `action`, optionally on `post`.
pub fn authorize(identity: &Identity, action: Permission, post: Option<&Post>) -> Result<(), AuthzError> {
    if !identity.can(action) {
        return Err(AuthzError::InsufficientPermission(action));
    }

    if let (Permission::Edit | Permission::Delete, Some(post)) = (action, post) {
        if !identity.is_admin() && post.user_id != identity.user_id() {
            return Err(AuthzError::NotOwner(action));
        }
    }

    Ok(())
}

/// Per-post capability flags shown alongside a single post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCapabilities {
    pub can_edit: bool,
    pub can_delete: bool,
}

impl PostCapabilities {
    pub fn for_post(identity: &Identity, post: &Post) -> Self {
        Self {
            can_edit: authorize(identity, Permission::Edit, Some(post)).is_ok(),
            can_delete: authorize(identity, Permission::Delete, Some(post)).is_ok(),
        }
    }
}

/// Caller-wide capability flags shown alongside a post listing.
///
/// These reflect the action gate only; ownership is decided per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCapabilities {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl ListCapabilities {
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            can_create: authorize(identity, Permission::Create, None).is_ok(),
            can_edit: authorize(identity, Permission::Edit, None).is_ok(),
            can_delete: authorize(identity, Permission::Delete, None).is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use chrono::Utc;

    fn identity(id: i64, roles: &[Role]) -> Identity {
        let mut user = User::new(format!("user{}", id), format!("user{}@example.com", id), String::new());
        user.id = id;
        Identity::new(user, roles.iter().copied())
    }

    fn post_owned_by(user_id: i64) -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            title: "T".to_string(),
            content: "C".to_string(),
            is_published: false,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_viewer_cannot_create() {
        let viewer = identity(1, &[Role::Viewer]);
        assert_eq!(
            authorize(&viewer, Permission::Create, None),
            Err(AuthzError::InsufficientPermission(Permission::Create))
        );
        assert!(authorize(&viewer, Permission::View, Some(&post_owned_by(2))).is_ok());
    }

    #[test]
    fn test_manager_edits_only_own_posts() {
        let manager = identity(1, &[Role::Manager]);

        assert!(authorize(&manager, Permission::Edit, Some(&post_owned_by(1))).is_ok());
        assert_eq!(
            authorize(&manager, Permission::Edit, Some(&post_owned_by(2))),
            Err(AuthzError::NotOwner(Permission::Edit))
        );
    }

    #[test]
    fn test_manager_cannot_delete_even_own_posts() {
        let manager = identity(1, &[Role::Manager]);
        assert_eq!(
            authorize(&manager, Permission::Delete, Some(&post_owned_by(1))),
            Err(AuthzError::InsufficientPermission(Permission::Delete))
        );
    }

    #[test]
    fn test_admin_bypasses_ownership() {
        let admin = identity(1, &[Role::Admin]);
        assert!(authorize(&admin, Permission::Edit, Some(&post_owned_by(2))).is_ok());
        assert!(authorize(&admin, Permission::Delete, Some(&post_owned_by(2))).is_ok());
    }

    #[test]
    fn test_no_roles_denied_everything() {
        let nobody = identity(1, &[]);
        for action in Permission::ALL {
            assert_eq!(
                authorize(&nobody, action, Some(&post_owned_by(1))),
                Err(AuthzError::InsufficientPermission(action))
            );
        }
    }

    #[test]
    fn test_capability_flags() {
        let manager = identity(1, &[Role::Manager]);

        assert_eq!(
            PostCapabilities::for_post(&manager, &post_owned_by(1)),
            PostCapabilities { can_edit: true, can_delete: false }
        );
        assert_eq!(
            PostCapabilities::for_post(&manager, &post_owned_by(2)),
            PostCapabilities { can_edit: false, can_delete: false }
        );
        assert_eq!(
            ListCapabilities::for_identity(&manager),
            ListCapabilities { can_create: true, can_edit: true, can_delete: false }
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AuthzError::InsufficientPermission(Permission::Create).to_string(),
            "You do not have permission to create posts."
        );
        assert_eq!(
            AuthzError::NotOwner(Permission::Edit).to_string(),
            "You can only edit your own posts."
        );
    }
}
