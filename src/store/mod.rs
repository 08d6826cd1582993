//! Hierarchical tree store abstraction.
//!
//! The application data lives in one JSON tree with a collection per entity
//! kind (`clubs`, `users`, `notifications`), each mapping a generated key to a
//! record. The repository only talks to the tree through [`TreeStore`], so the
//! remote REST tree and the in-memory tree are interchangeable.

mod memory;
mod remote;

pub use memory::MemoryStore;
pub use remote::RestStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::AppError;

/// Characters the remote tree refuses inside a key.
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '#', '$', '[', ']', '/'];

/// A subtree together with the content tag needed for a conditional write.
#[derive(Debug, Clone)]
pub struct Versioned {
    pub value: Value,
    pub etag: String,
}

/// Operations the data access layer needs from the tree.
///
/// Paths are slash-separated and relative to the tree root. An absent path
/// reads as `Value::Null`.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Fetch the whole subtree at `path`.
    async fn get(&self, path: &str) -> Result<Value, AppError>;

    /// Fetch the subtree at `path` along with its current content tag.
    async fn get_versioned(&self, path: &str) -> Result<Versioned, AppError>;

    /// Append `value` as a new child of `path` and return the generated key.
    ///
    /// Generated keys sort in creation order.
    async fn push(&self, path: &str, value: &Value) -> Result<String, AppError>;

    /// Partial update of the children of `path`.
    ///
    /// Field names may be relative paths (`"<key>/read"`), which turns one call
    /// into a multi-location update. A `null` value removes that child.
    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), AppError>;

    /// Replace the subtree at `path` only if its tag still equals `etag`.
    ///
    /// Returns `false` when another writer changed the subtree first.
    async fn set_if_match(&self, path: &str, value: &Value, etag: &str)
        -> Result<bool, AppError>;

    /// Delete the subtree at `path`. Removing an absent path succeeds.
    async fn remove(&self, path: &str) -> Result<(), AppError>;
}

/// Check that a caller-supplied key can be used as a single path segment.
pub fn validate_key(key: &str) -> Result<&str, AppError> {
    if key.is_empty() {
        return Err(AppError::Validation("Key must not be empty".to_string()));
    }
    if key.contains(FORBIDDEN_KEY_CHARS) || key.chars().any(char::is_control) {
        return Err(AppError::Validation(format!(
            "Key {:?} contains characters the store does not allow",
            key
        )));
    }
    Ok(key)
}

/// Join path segments with `/`.
pub fn child_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Split a path into its non-empty segments.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
