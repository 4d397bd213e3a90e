//! Demo data
//!
//! Creates one account per role and a handful of sample posts. Safe to run
//! on every start: existing accounts are reused and posts are only added to
//! an empty table.

use crate::db::repositories::{PostRepository, RoleRepository, UserRepository};
use crate::models::{PostInput, Role, User};
use crate::services::password::hash_password;
use anyhow::Result;
use std::sync::Arc;

/// Password shared by every demo account
pub const DEMO_PASSWORD: &str = "password";

const DEMO_USERS: [(&str, &str, Role); 3] = [
    ("Admin User", "admin@example.com", Role::Admin),
    ("Manager User", "manager@example.com", Role::Manager),
    ("Viewer User", "viewer@example.com", Role::Viewer),
];

const DEMO_POSTS: [(&str, &str, bool); 5] = [
    (
        "Role-based access control",
        "How roles, permissions and ownership combine to decide who may do what with a post.",
        true,
    ),
    (
        "Hashing passwords with Argon2",
        "Why a memory-hard hash with a per-user salt is the baseline for storing credentials.",
        true,
    ),
    (
        "Designing the posts table",
        "Foreign keys, timestamps and the indexes a paginated listing relies on.",
        false,
    ),
    (
        "Bearer tokens",
        "Opaque tokens, hashed at rest, resolved on every request.",
        true,
    ),
    (
        "Input validation",
        "Field-keyed error messages and why the first one becomes the headline.",
        true,
    ),
];

/// What a seeding run created
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub posts_created: usize,
}

pub struct Seeder {
    user_repo: Arc<dyn UserRepository>,
    role_repo: Arc<dyn RoleRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl Seeder {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        role_repo: Arc<dyn RoleRepository>,
        post_repo: Arc<dyn PostRepository>,
    ) -> Self {
        Self {
            user_repo,
            role_repo,
            post_repo,
        }
    }

    pub async fn run(&self) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        let mut owners = Vec::with_capacity(DEMO_USERS.len());

        for (name, email, role) in DEMO_USERS {
            let user = match self.user_repo.get_by_email(email).await? {
                Some(user) => user,
                None => {
                    let user = User::new(name.to_string(), email.to_string(), hash_password(DEMO_PASSWORD)?);
                    report.users_created += 1;
                    self.user_repo.create(&user).await?
                }
            };
            self.role_repo.assign(user.id, role).await?;
            owners.push(user.id);
        }

        if self.post_repo.count().await? == 0 {
            for (i, (title, content, is_published)) in DEMO_POSTS.into_iter().enumerate() {
                let owner = owners[i % owners.len()];
                self.post_repo
                    .create(owner, &PostInput::new(title, content, is_published))
                    .await?;
                report.posts_created += 1;
            }
        }

        tracing::info!(
            users = report.users_created,
            posts = report.posts_created,
            "Demo data seeded"
        );
        Ok(report)
    }
}
