//! Post repository
//!
//! CRUD over posts. Reads join the author so payloads can embed
//! `{id, name, email}` without a second query.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, Post, PostInput, PostWithAuthor, UserSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post owned by `user_id`
    async fn create(&self, user_id: i64, input: &PostInput) -> Result<PostWithAuthor>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PostWithAuthor>>;

    /// Replace title, content and publication flag. `None` if the post is gone.
    async fn update(&self, id: i64, input: &PostInput) -> Result<Option<PostWithAuthor>>;

    /// Returns whether a post was deleted
    async fn delete(&self, id: i64) -> Result<bool>;

    /// One page of posts, newest first (ties broken by id, descending),
    /// plus the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<PostWithAuthor>, i64)>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based post repository for SQLite and MySQL
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, user_id: i64, input: &PostInput) -> Result<PostWithAuthor> {
        let id = match self.pool.backend()? {
            Backend::Sqlite(pool) => insert_post_sqlite(pool, user_id, input).await?,
            Backend::Mysql(pool) => insert_post_mysql(pool, user_id, input).await?,
        };

        self.get_by_id(id)
            .await?
            .with_context(|| format!("Post {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PostWithAuthor>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => get_post_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_post_by_id_mysql(pool, id).await,
        }
    }

    async fn update(&self, id: i64, input: &PostInput) -> Result<Option<PostWithAuthor>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => update_post_sqlite(pool, id, input).await?,
            Backend::Mysql(pool) => update_post_mysql(pool, id, input).await?,
        }

        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => delete_post_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_post_mysql(pool, id).await,
        }
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<PostWithAuthor>, i64)> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => list_posts_sqlite(pool, params).await,
            Backend::Mysql(pool) => list_posts_mysql(pool, params).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => count_posts_sqlite(pool).await,
            Backend::Mysql(pool) => count_posts_mysql(pool).await,
        }
    }
}

const SELECT_POST_WITH_AUTHOR: &str = r#"
    SELECT p.id, p.title, p.content, p.is_published, p.user_id, p.created_at, p.updated_at,
           u.name AS author_name, u.email AS author_email
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_post_sqlite(pool: &SqlitePool, user_id: i64, input: &PostInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, is_published, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.is_published)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(result.last_insert_rowid())
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<PostWithAuthor>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_POST_WITH_AUTHOR))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    Ok(row.as_ref().map(row_to_post_sqlite))
}

async fn update_post_sqlite(pool: &SqlitePool, id: i64, input: &PostInput) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, is_published = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.is_published)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(())
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(result.rows_affected() > 0)
}

async fn list_posts_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<(Vec<PostWithAuthor>, i64)> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        SELECT_POST_WITH_AUTHOR
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    let posts = rows.iter().map(row_to_post_sqlite).collect();
    let total = count_posts_sqlite(pool).await?;

    Ok((posts, total))
}

async fn count_posts_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.get("count"))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> PostWithAuthor {
    let user_id: i64 = row.get("user_id");
    PostWithAuthor {
        post: Post {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            is_published: row.get("is_published"),
            user_id,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        user: UserSummary {
            id: user_id,
            name: row.get("author_name"),
            email: row.get("author_email"),
        },
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_post_mysql(pool: &MySqlPool, user_id: i64, input: &PostInput) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, is_published, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.is_published)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(result.last_insert_id() as i64)
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<PostWithAuthor>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_POST_WITH_AUTHOR))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;

    Ok(row.as_ref().map(row_to_post_mysql))
}

async fn update_post_mysql(pool: &MySqlPool, id: i64, input: &PostInput) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, is_published = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.is_published)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(())
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(result.rows_affected() > 0)
}

async fn list_posts_mysql(pool: &MySqlPool, params: &ListParams) -> Result<(Vec<PostWithAuthor>, i64)> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        SELECT_POST_WITH_AUTHOR
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    let posts = rows.iter().map(row_to_post_mysql).collect();
    let total = count_posts_mysql(pool).await?;

    Ok((posts, total))
}

async fn count_posts_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.get("count"))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> PostWithAuthor {
    let user_id: i64 = row.get("user_id");
    PostWithAuthor {
        post: Post {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            is_published: row.get("is_published"),
            user_id,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        user: UserSummary {
            id: user_id,
            name: row.get("author_name"),
            email: row.get("author_email"),
        },
    }
}
