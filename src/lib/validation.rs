//! Input validation utilities
//!
//! Configuration problems are collected into a [`Problems`] list rather than failing on
//! the first one, so a run reports everything that is wrong with its arguments at once.

use crate::errors::{Result, RevertError};
use noodles::sam::alignment::record::data::field::Tag;
use std::path::Path;

/// Accumulates configuration problems.
#[derive(Debug, Default)]
pub struct Problems {
    messages: Vec<String>,
}

impl Problems {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a problem.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Adds a problem if `check` returned one.
    pub fn check(&mut self, check: Option<String>) {
        if let Some(message) = check {
            self.messages.push(message);
        }
    }

    /// Adds every problem from `other`.
    pub fn extend(&mut self, other: impl IntoIterator<Item = String>) {
        self.messages.extend(other);
    }

    /// Converts the collected problems into a single error.
    ///
    /// # Errors
    /// Returns [`RevertError::InvalidConfiguration`] if any problem was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(RevertError::InvalidConfiguration { messages: self.messages })
        }
    }
}

/// Parses a two-character SAM tag.
///
/// # Errors
/// Returns a message if the tag is not exactly 2 ASCII alphanumeric characters
///
/// # Example
/// ```
/// use fgrevert_lib::validation::string_to_tag;
///
/// assert!(string_to_tag("NM", "attribute to clear").is_ok());
/// assert!(string_to_tag("NMX", "attribute to clear").is_err());
/// ```
pub fn string_to_tag(tag: &str, name: &str) -> std::result::Result<Tag, String> {
    match tag.as_bytes() {
        [a, b] if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() => Ok(Tag::new(*a, *b)),
        _ => Err(format!("Invalid {name} '{tag}': tag must be exactly 2 alphanumeric characters")),
    }
}

/// Returns a problem if `path` is not an existing file.
#[must_use]
pub fn check_file_exists(path: &Path, description: &str) -> Option<String> {
    if path.is_file() {
        None
    } else {
        Some(format!("{description} does not exist or is not a file: {}", path.display()))
    }
}

/// Returns a problem if `path` is not an existing directory.
#[must_use]
pub fn check_directory_exists(path: &Path, description: &str) -> Option<String> {
    if path.is_dir() {
        None
    } else {
        Some(format!("{description} is not a directory: {}", path.display()))
    }
}

/// Returns a problem if a file cannot be created at `path`: it is a directory, or its
/// parent directory does not exist or is read-only.
#[must_use]
pub fn check_writable_file(path: &Path, description: &str) -> Option<String> {
    if path.is_dir() {
        return Some(format!("{description} is a directory, expected a file: {}", path.display()));
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match parent.metadata() {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => None,
        Ok(meta) if meta.is_dir() => {
            Some(format!("{description} directory is not writable: {}", parent.display()))
        }
        _ => Some(format!("{description} directory does not exist: {}", parent.display())),
    }
}

/// Returns a problem if `value` is outside `[0, 1]`.
#[must_use]
pub fn check_fraction(value: f64, name: &str) -> Option<String> {
    if (0.0..=1.0).contains(&value) {
        None
    } else {
        Some(format!("{name} must be between 0 and 1, got {value}"))
    }
}
