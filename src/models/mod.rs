//! Data models
//!
//! Database entities (User, Session, Post), the role/permission registry,
//! and the request/response types shared by the server and the client.

mod identity;
mod pagination;
mod permission;
mod post;
mod session;
mod user;
mod validation;

pub use identity::Identity;
pub use pagination::{ListParams, PagedResult};
pub use permission::{effective_permissions, Permission, Role};
pub use post::{Post, PostInput, PostWithAuthor, RawPostInput, TITLE_MAX_CHARS};
pub use session::Session;
pub use user::{User, UserSummary};
pub use validation::ValidationErrors;
