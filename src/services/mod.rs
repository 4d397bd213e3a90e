//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They own
//! authentication, authorization decisions and validation.

pub mod auth;
pub mod authorizer;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod seeder;

pub use auth::{AuthService, AuthServiceError, LoginInput, LoginResult, INVALID_CREDENTIALS};
pub use authorizer::{authorize, AuthzError, ListCapabilities, PostCapabilities};
pub use password::{hash_password, verify_password};
pub use post::{PostListing, PostService, PostServiceError, PostView};
pub use rate_limiter::LoginRateLimiter;
pub use seeder::{SeedReport, Seeder, DEMO_PASSWORD};
