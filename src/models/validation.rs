//! Field-keyed validation errors

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Validation failures grouped by field, in the order fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single-field failure
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.fields.push((field.to_string(), vec![message])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total number of messages across all fields
    pub fn count(&self) -> usize {
        self.fields.iter().map(|(_, messages)| messages.len()).sum()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn first_message(&self) -> Option<&str> {
        self.fields
            .first()
            .and_then(|(_, messages)| messages.first())
            .map(String::as_str)
    }

    /// Headline message: the first failure, plus how many others there are.
    pub fn summary(&self) -> String {
        let first = self.first_message().unwrap_or("The given data was invalid.");
        match self.count().saturating_sub(1) {
            0 => first.to_string(),
            1 => format!("{} (and 1 more error)", first),
            more => format!("{} (and {} more errors)", first, more),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, messages) in &self.fields {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let errors = ValidationErrors::new();
        assert!(errors.is_empty());
        assert_eq!(errors.summary(), "The given data was invalid.");
    }

    #[test]
    fn test_summary_counts_remaining_messages() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "The title field is required.");
        assert_eq!(errors.summary(), "The title field is required.");

        errors.add("content", "The content field is required.");
        assert_eq!(errors.summary(), "The title field is required. (and 1 more error)");

        errors.add("content", "Another.");
        assert_eq!(errors.summary(), "The title field is required. (and 2 more errors)");
        assert_eq!(errors.count(), 3);
    }

    #[test]
    fn test_serializes_in_insertion_order() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "t");
        errors.add("content", "c");

        let json = serde_json::to_string(&errors).unwrap();
        assert_eq!(json, r#"{"title":["t"],"content":["c"]}"#);
        assert_eq!(errors.get("content"), Some(&["c".to_string()][..]));
    }
}
