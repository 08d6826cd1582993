//! In-memory tree store.
//!
//! Mirrors the remote tree's observable behaviour: empty objects and nulls are
//! never stored, push keys are time ordered, and content tags change whenever
//! the subtree changes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{segments, TreeStore, Versioned};
use crate::errors::AppError;

/// Tree held in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_data(Value::Null)
    }

    /// Create a store pre-populated with `root`.
    pub fn with_data(root: Value) -> Self {
        Self {
            root: RwLock::new(prune(root)),
        }
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Value, AppError> {
        let root = self.root.read().await;
        Ok(lookup(&root, &segments(path)).cloned().unwrap_or(Value::Null))
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, AppError> {
        let root = self.root.read().await;
        let value = lookup(&root, &segments(path))
            .cloned()
            .unwrap_or(Value::Null);
        let etag = etag_of(&value);
        Ok(Versioned { value, etag })
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, AppError> {
        let key = Uuid::now_v7().simple().to_string();
        let record_path = super::child_path(path, &key);

        let mut root = self.root.write().await;
        set_at(&mut root, &segments(&record_path), value.clone());
        tracing::debug!(path, key = %key, "pushed record");
        Ok(key)
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), AppError> {
        let base = segments(path);
        let mut root = self.root.write().await;
        for (field, value) in fields {
            let mut segs = base.clone();
            segs.extend(segments(field));
            set_at(&mut root, &segs, value.clone());
        }
        Ok(())
    }

    async fn set_if_match(
        &self,
        path: &str,
        value: &Value,
        etag: &str,
    ) -> Result<bool, AppError> {
        let segs = segments(path);
        let mut root = self.root.write().await;
        let current = lookup(&root, &segs).cloned().unwrap_or(Value::Null);
        if etag_of(&current) != etag {
            return Ok(false);
        }
        set_at(&mut root, &segs, value.clone());
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        let mut root = self.root.write().await;
        remove_at(&mut root, &segments(path));
        Ok(())
    }
}

fn lookup<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut node = root;
    for seg in segs {
        node = match node {
            Value::Object(map) => map.get(*seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Walk into `seg`, turning `node` into an object if it is not one already.
fn child_mut<'a>(node: &'a mut Value, seg: &str) -> &'a mut Value {
    if !node.is_object() {
        let map: Map<String, Value> = match std::mem::take(node) {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Map::new(),
        };
        *node = Value::Object(map);
    }
    &mut node[seg]
}

fn set_at(root: &mut Value, segs: &[&str], value: Value) {
    let value = prune(value);
    if value.is_null() {
        remove_at(root, segs);
        return;
    }
    let mut node = root;
    for seg in segs {
        node = child_mut(node, seg);
    }
    *node = value;
}

fn remove_at(node: &mut Value, segs: &[&str]) {
    let Some((first, rest)) = segs.split_first() else {
        *node = Value::Null;
        return;
    };
    if node.is_array() {
        let _ = child_mut(node, first);
    }
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        map.remove(*first);
    } else if let Some(child) = map.get_mut(*first) {
        remove_at(child, rest);
        if is_empty(child) {
            map.remove(*first);
        }
    }
    if map.is_empty() {
        *node = Value::Null;
    }
}

/// Drop nulls and empty containers, as the remote tree never stores them.
fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if kept.is_empty() {
                Value::Null
            } else {
                Value::Object(kept)
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                Value::Null
            } else {
                Value::Array(items.into_iter().map(prune).collect())
            }
        }
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn etag_of(value: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_absent_path_reads_null() {
        let store = MemoryStore::new();
        assert_eq!(store.get("clubs").await.unwrap(), Value::Null);
        assert_eq!(store.get("clubs/missing/name").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_push_keys_are_ordered() {
        let store = MemoryStore::new();
        let mut keys = Vec::new();
        for i in 0..20 {
            keys.push(store.push("users", &json!({ "n": i })).await.unwrap());
        }

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let users = store.get("users").await.unwrap();
        let order: Vec<i64> = users
            .as_object()
            .unwrap()
            .values()
            .map(|u| u["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_update_is_partial_and_accepts_nested_paths() {
        let store = MemoryStore::with_data(json!({
            "notifications": {
                "a": { "to": "x@example.com", "read": false },
                "b": { "to": "y@example.com", "read": false }
            }
        }));

        let mut fields = Map::new();
        fields.insert("a/read".to_string(), json!(true));
        store.update("notifications", &fields).await.unwrap();

        assert_eq!(store.get("notifications/a/read").await.unwrap(), json!(true));
        assert_eq!(store.get("notifications/a/to").await.unwrap(), json!("x@example.com"));
        assert_eq!(store.get("notifications/b/read").await.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_null_update_removes_child() {
        let store = MemoryStore::with_data(json!({ "users": { "u1": { "email": "a", "role": "member" } } }));

        let mut fields = Map::new();
        fields.insert("role".to_string(), Value::Null);
        store.update("users/u1", &fields).await.unwrap();

        assert_eq!(store.get("users/u1").await.unwrap(), json!({ "email": "a" }));
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parents() {
        let store = MemoryStore::with_data(json!({ "notifications": { "n1": { "to": "a" } } }));
        store.remove("notifications/n1").await.unwrap();
        assert_eq!(store.get("notifications").await.unwrap(), Value::Null);

        // Removing again is not an error
        store.remove("notifications/n1").await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_values_are_not_stored() {
        let store = MemoryStore::new();
        let mut fields = Map::new();
        fields.insert("questions".to_string(), json!([]));
        fields.insert("name".to_string(), json!("Chess"));
        store.update("clubs/c1", &fields).await.unwrap();

        assert_eq!(store.get("clubs/c1").await.unwrap(), json!({ "name": "Chess" }));
    }

    #[tokio::test]
    async fn test_set_if_match_detects_concurrent_change() {
        let store = MemoryStore::with_data(json!({ "clubs": { "c1": { "joinRequests": ["a"] } } }));

        let first = store.get_versioned("clubs/c1/joinRequests").await.unwrap();
        let second = store.get_versioned("clubs/c1/joinRequests").await.unwrap();
        assert_eq!(first.etag, second.etag);

        assert!(store
            .set_if_match("clubs/c1/joinRequests", &json!(["a", "b"]), &first.etag)
            .await
            .unwrap());
        assert!(!store
            .set_if_match("clubs/c1/joinRequests", &json!(["a", "c"]), &second.etag)
            .await
            .unwrap());

        assert_eq!(
            store.get("clubs/c1/joinRequests").await.unwrap(),
            json!(["a", "b"])
        );
    }

    #[tokio::test]
    async fn test_set_if_match_on_absent_path() {
        let store = MemoryStore::new();
        let versioned = store.get_versioned("clubs/c1/questions").await.unwrap();
        assert_eq!(versioned.value, Value::Null);

        assert!(store
            .set_if_match("clubs/c1/questions", &json!(["q"]), &versioned.etag)
            .await
            .unwrap());
        assert_eq!(store.get("clubs/c1/questions/0").await.unwrap(), json!("q"));
    }
}
