//! Post model
//!
//! Posts are owned by exactly one user (`user_id`), fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::user::UserSummary;
use super::validation::ValidationErrors;

/// Maximum title length in characters
pub const TITLE_MAX_CHARS: usize = 255;

/// Post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub is_published: bool,
    /// Owner (author) of the post
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post payload with its author embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub user: UserSummary,
}

/// Validated fields for creating or replacing a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub is_published: bool,
}

impl PostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>, is_published: bool) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            is_published,
        }
    }
}

/// Untyped request body for post create/update.
///
/// Fields are kept as raw JSON so that wrong types surface as field
/// validation errors instead of body rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPostInput {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub is_published: Option<Value>,
    /// Set when the request body itself could not be read
    #[serde(skip)]
    rejected: Option<ValidationErrors>,
}

impl RawPostInput {
    /// A body that failed to parse. Validation reports `errors` unchanged.
    pub fn rejected(errors: ValidationErrors) -> Self {
        Self {
            rejected: Some(errors),
            ..Self::default()
        }
    }

    /// Check every field and produce the typed input.
    ///
    /// Strings are trimmed; a blank string counts as missing.
    pub fn validate(&self) -> Result<PostInput, ValidationErrors> {
        if let Some(errors) = &self.rejected {
            return Err(errors.clone());
        }

        let mut errors = ValidationErrors::new();

        let title = required_string(&mut errors, "title", self.title.as_ref());
        if let Some(title) = &title {
            if title.chars().count() > TITLE_MAX_CHARS {
                errors.add(
                    "title",
                    format!(
                        "The title field must not be greater than {} characters.",
                        TITLE_MAX_CHARS
                    ),
                );
            }
        }

        let content = required_string(&mut errors, "content", self.content.as_ref());

        let is_published = match parse_flag(self.is_published.as_ref()) {
            Some(flag) => flag,
            None => {
                errors.add("is_published", "The is published field must be true or false.");
                false
            }
        };

        match (title, content) {
            (Some(title), Some(content)) if errors.is_empty() => Ok(PostInput {
                title,
                content,
                is_published,
            }),
            _ => Err(errors),
        }
    }
}

fn required_string(errors: &mut ValidationErrors, field: &str, value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => {
            errors.add(field, format!("The {} field is required.", field));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, format!("The {} field is required.", field));
            None
        }
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => {
            errors.add(field, format!("The {} field must be a string.", field));
            None
        }
    }
}

/// Accepts `true`, `false`, `0`, `1`, `"0"`, `"1"`; absent or null is `false`.
fn parse_flag(value: Option<&Value>) -> Option<bool> {
    match value {
        None | Some(Value::Null) => Some(false),
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Some(Value::String(s)) => match s.as_str() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
        Some(_) => None,
    }
}
