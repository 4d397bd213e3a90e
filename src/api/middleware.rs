//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The error envelope every failure is rendered as
//! - Bearer token authentication

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::repositories::{SqlxPostRepository, SqlxRoleRepository, SqlxSessionRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::models::{Identity, ValidationErrors};
use crate::services::{
    AuthService, AuthServiceError, LoginRateLimiter, PostService, PostServiceError, INVALID_CREDENTIALS,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub auth_service: Arc<AuthService>,
    pub post_service: Arc<PostService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, auth: &AuthConfig) -> Self {
        let auth_service = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxRoleRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        )
        .with_session_ttl(auth.session_ttl());

        Self {
            post_service: Arc::new(PostService::new(SqlxPostRepository::boxed(pool.clone()))),
            auth_service: Arc::new(auth_service),
            rate_limiter: Arc::new(LoginRateLimiter::from_config(auth)),
            pool,
        }
    }
}

/// Identity of the caller, resolved from the bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

/// The bearer token the request was authenticated with
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

// ============================================================================
// Errors
// ============================================================================

/// Error envelope: `{success: false, code, message, errors?}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
            errors: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new("UNAUTHENTICATED", "Unauthenticated.")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        Self {
            message: errors.summary(),
            errors: Some(errors),
            ..Self::new("VALIDATION_ERROR", String::new())
        }
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TOO_MANY_REQUESTS", message)
    }

    /// Logs the cause; the body only carries a generic message
    pub fn internal(cause: impl Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::new("INTERNAL_ERROR", "Server Error")
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            "UNAUTHENTICATED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
            "TOO_MANY_REQUESTS" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::Validation(errors) => Self::validation(errors),
            AuthServiceError::InvalidCredentials => {
                Self::validation(ValidationErrors::single("email", INVALID_CREDENTIALS))
            }
            AuthServiceError::Unauthenticated => Self::unauthenticated(),
            AuthServiceError::Internal(e) => Self::internal(format!("{:#}", e)),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::Validation(errors) => Self::validation(errors),
            PostServiceError::Forbidden(e) => Self::forbidden(e.to_string()),
            PostServiceError::NotFound(_) => Self::not_found("Post not found."),
            PostServiceError::Internal(e) => Self::internal(format!("{:#}", e)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(ValidationErrors::single("body", rejection.body_text()))
    }
}

/// JSON body extractor whose rejections use the error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

// ============================================================================
// Authentication
// ============================================================================

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Authentication middleware.
///
/// Resolves the token on every request; nothing is cached between requests.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request).ok_or_else(ApiError::unauthenticated)?;
    let identity = state.auth_service.resolve_session(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(identity));
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(ApiError::unauthenticated)
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionToken>()
            .cloned()
            .ok_or_else(ApiError::unauthenticated)
    }
}
