//! Shared API response types
//!
//! Success bodies all carry `success: true`. The same types are used by the
//! HTTP client to decode responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{PagedResult, Permission, PostWithAuthor, Role, User};
use crate::services::{ListCapabilities, PostCapabilities};

// ============================================================================
// Envelopes
// ============================================================================

/// `{success, message?, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

/// `{success, message}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Who the caller is and what they may do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeData {
    pub user: User,
    pub permissions: BTreeSet<Permission>,
    pub roles: BTreeSet<Role>,
}

// ============================================================================
// Posts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListResponse {
    pub success: bool,
    pub data: PagedResult<PostWithAuthor>,
    pub user_permissions: ListCapabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostShowResponse {
    pub success: bool,
    pub data: PostWithAuthor,
    pub permissions: PostCapabilities,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}
