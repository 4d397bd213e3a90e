//! Post API endpoints
//!
//! All routes require authentication:
//! - GET /api/posts - Paginated list, newest first
//! - POST /api/posts - Create a post owned by the caller
//! - GET /api/posts/{id} - Single post with the caller's capabilities
//! - PUT /api/posts/{id} - Replace a post
//! - DELETE /api/posts/{id} - Delete a post

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{DataResponse, MessageResponse, PostListResponse, PostShowResponse};
use crate::models::{ListParams, PostWithAuthor, RawPostInput, ValidationErrors};

/// Posts per page
pub const POSTS_PER_PAGE: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(show_post).put(update_post).delete(delete_post))
}

/// Query parameters for listing posts.
///
/// `page` is taken as a string so that garbage falls back to the first page.
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default)]
    pub page: Option<String>,
}

impl ListPostsQuery {
    fn params(&self) -> ListParams {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1);
        ListParams::new(page, POSTS_PER_PAGE)
    }
}

/// Ids that are not integers cannot name a post
fn parse_post_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::not_found("Post not found."))
}

/// Unreadable bodies are only reported once the caller passes every
/// permission, lookup and ownership check.
fn read_body(body: Result<Json<RawPostInput>, JsonRejection>) -> RawPostInput {
    match body {
        Ok(Json(input)) => input,
        Err(rejection) => RawPostInput::rejected(ValidationErrors::single("body", rejection.body_text())),
    }
}

/// GET /api/posts?page=N
async fn list_posts(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let listing = state.post_service.list(&identity, query.params()).await?;

    Ok(Json(PostListResponse {
        success: true,
        data: listing.page,
        user_permissions: listing.capabilities,
    }))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    body: Result<Json<RawPostInput>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<PostWithAuthor>>), ApiError> {
    let post = state.post_service.create(&identity, &read_body(body)).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message("Post created.", post)),
    ))
}

/// GET /api/posts/{id}
async fn show_post(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<PostShowResponse>, ApiError> {
    let id = parse_post_id(&id)?;
    let view = state.post_service.show(&identity, id).await?;

    Ok(Json(PostShowResponse {
        success: true,
        data: view.post,
        permissions: view.capabilities,
    }))
}

/// PUT /api/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
    body: Result<Json<RawPostInput>, JsonRejection>,
) -> Result<Json<DataResponse<PostWithAuthor>>, ApiError> {
    let id = parse_post_id(&id)?;
    let post = state.post_service.update(&identity, id, &read_body(body)).await?;

    Ok(Json(DataResponse::with_message("Post updated.", post)))
}

/// DELETE /api/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_post_id(&id)?;
    state.post_service.delete(&identity, id).await?;

    Ok(Json(MessageResponse::new("Post deleted.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>) -> ListPostsQuery {
        ListPostsQuery {
            page: page.map(str::to_string),
        }
    }

    #[test]
    fn test_page_parsing() {
        assert_eq!(query(None).params().page, 1);
        assert_eq!(query(Some("3")).params().page, 3);
        assert_eq!(query(Some("0")).params().page, 1);
        assert_eq!(query(Some("-2")).params().page, 1);
        assert_eq!(query(Some("abc")).params().page, 1);
        assert_eq!(query(Some("2")).params().per_page, POSTS_PER_PAGE);
    }

    #[test]
    fn test_post_id_parsing() {
        assert_eq!(parse_post_id("42").unwrap(), 42);
        assert_eq!(parse_post_id("abc").unwrap_err().code, "NOT_FOUND");
    }
}
