//! Database repositories
//!
//! One repository per aggregate, each a trait plus a SQLx implementation
//! covering SQLite and MySQL.

pub mod post;
pub mod role;
pub mod session;
pub mod user;

pub use post::{PostRepository, SqlxPostRepository};
pub use role::{catalog_drift, expected_catalog, Catalog, RoleRepository, SqlxRoleRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
