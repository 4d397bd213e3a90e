//! HTTP client for the postguard API
//!
//! [`ApiClient`] attaches the stored bearer token to every request. Any 401
//! tears down the local session before the error reaches the caller.
//!
//! ```ignore
//! let client = ApiClient::new("http://localhost:8000")?;
//! client.login("manager@example.com", "password").await?;
//! let page = client.list_posts(1).await?;
//! ```

pub mod session;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::responses::{
    DataResponse, HealthResponse, MeData, MessageResponse, PostListResponse, PostShowResponse,
};
use crate::models::{PostInput, PostWithAuthor};
use crate::services::LoginResult;

pub use session::{ClientSession, FileSessionStore, MemorySessionStore, SessionManager, SessionStore};

/// Error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the token; the local session has been cleared
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Error envelope as sent by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// API client bound to one server
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Client with an in-memory session
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_store(base_url, Arc::new(MemorySessionStore::new()))
    }

    /// Client whose session is persisted in `store`
    pub fn with_store(base_url: impl Into<String>, store: Arc<dyn SessionStore>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: Arc::new(SessionManager::new(store)),
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api{}", self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Send with the bearer token attached and decode a success body
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let sent_token = self.session.token().await;
        let builder = match &sent_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::UNAUTHORIZED {
            // Only the token that was rejected is forgotten
            if let Some(token) = &sent_token {
                if self.session.clear_if_token(token).await {
                    tracing::debug!("Server returned 401, session cleared");
                }
            }
            return Err(ClientError::Unauthenticated);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or(ErrorBody {
            message: text,
            errors: BTreeMap::new(),
        });

        Err(match status {
            StatusCode::FORBIDDEN => ClientError::Forbidden(body.message),
            StatusCode::NOT_FOUND => ClientError::NotFound(body.message),
            StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
                message: body.message,
                errors: body.errors,
            },
            StatusCode::TOO_MANY_REQUESTS => ClientError::TooManyRequests(body.message),
            _ => ClientError::Server {
                status: status.as_u16(),
                message: body.message,
            },
        })
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Log in and remember the token and identity
    pub async fn login(&self, email: &str, password: &str) -> Result<ClientSession, ClientError> {
        let response: DataResponse<LoginResult> = self
            .send(self.request(Method::POST, "/login").json(&LoginRequest { email, password }))
            .await?;

        let result = response.data;
        let session = ClientSession {
            token: result.token,
            user: result.user,
            roles: result.roles,
            permissions: result.permissions,
        };
        self.session.set(session.clone()).await?;

        Ok(session)
    }

    /// Revoke the token server-side if possible. Local state is always
    /// cleared and server failures are not reported.
    pub async fn logout(&self) {
        if self.session.is_authenticated().await {
            if let Err(e) = self
                .send::<MessageResponse>(self.request(Method::POST, "/logout"))
                .await
            {
                tracing::debug!("Logout request failed: {}", e);
            }
        }
        self.session.clear().await;
    }

    /// Re-validate a persisted session against `/me`.
    ///
    /// Returns the refreshed session, or `None` if there was none or the
    /// server no longer accepts it (in which case it is cleared).
    pub async fn restore(&self) -> Result<Option<ClientSession>, ClientError> {
        let Some(stored) = self.session.load().await? else {
            return Ok(None);
        };

        match self.me().await {
            Ok(me) => Ok(self
                .session
                .refresh_identity(me.user, me.roles, me.permissions)
                .await?),
            Err(e) => {
                tracing::debug!("Stored session rejected: {}", e);
                self.session.clear_if_token(&stored.token).await;
                Ok(None)
            }
        }
    }

    pub async fn me(&self) -> Result<MeData, ClientError> {
        let response: DataResponse<MeData> = self.send(self.request(Method::GET, "/me")).await?;
        Ok(response.data)
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub async fn list_posts(&self, page: u32) -> Result<PostListResponse, ClientError> {
        self.send(self.request(Method::GET, "/posts").query(&[("page", page)]))
            .await
    }

    pub async fn get_post(&self, id: i64) -> Result<PostShowResponse, ClientError> {
        self.send(self.request(Method::GET, &format!("/posts/{}", id)))
            .await
    }

    pub async fn create_post(&self, input: &PostInput) -> Result<PostWithAuthor, ClientError> {
        let response: DataResponse<PostWithAuthor> = self
            .send(self.request(Method::POST, "/posts").json(input))
            .await?;
        Ok(response.data)
    }

    pub async fn update_post(&self, id: i64, input: &PostInput) -> Result<PostWithAuthor, ClientError> {
        let response: DataResponse<PostWithAuthor> = self
            .send(self.request(Method::PUT, &format!("/posts/{}", id)).json(input))
            .await?;
        Ok(response.data)
    }

    pub async fn delete_post(&self, id: i64) -> Result<(), ClientError> {
        self.send::<MessageResponse>(self.request(Method::DELETE, &format!("/posts/{}", id)))
            .await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.request(Method::GET, "/health-check")).await
    }
}
