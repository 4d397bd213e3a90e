//! Authentication API endpoints
//!
//! - POST /api/login - Exchange credentials for a bearer token
//! - POST /api/logout - Revoke the current token
//! - GET /api/me - Current user, roles and permissions

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser, SessionToken};
use crate::api::responses::{DataResponse, MeData, MessageResponse};
use crate::services::{AuthServiceError, LoginInput, LoginResult};

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// POST /api/login
///
/// Failed credential checks count toward the per-email throttle; a
/// successful login resets it.
async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Json<DataResponse<LoginResult>>, ApiError> {
    let email = input.email.clone().unwrap_or_default();

    if state.rate_limiter.is_limited(&email).await {
        tracing::warn!(email = %email, "Login throttled");
        return Err(ApiError::too_many_requests(
            "Too many login attempts. Please try again later.",
        ));
    }

    match state.auth_service.login(&input).await {
        Ok(result) => {
            state.rate_limiter.clear(&email).await;
            tracing::info!(user_id = result.user.id, "User logged in");
            Ok(Json(DataResponse::with_message("Logged in.", result)))
        }
        Err(e) => {
            if matches!(e, AuthServiceError::InvalidCredentials) {
                state.rate_limiter.record_failure(&email).await;
                tracing::warn!(email = %email, "Login failed: invalid credentials");
            }
            Err(e.into())
        }
    }
}

/// POST /api/logout
///
/// Only the session behind the presented token is revoked.
async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<Json<MessageResponse>, ApiError> {
    let identity = state.auth_service.logout(&token).await?;
    tracing::info!(user_id = identity.user_id(), "User logged out");

    Ok(Json(MessageResponse::new("Logged out.")))
}

/// GET /api/me
async fn me(AuthenticatedUser(identity): AuthenticatedUser) -> Json<DataResponse<MeData>> {
    Json(DataResponse::new(MeData {
        permissions: identity.permissions(),
        roles: identity.roles,
        user: identity.user,
    }))
}
