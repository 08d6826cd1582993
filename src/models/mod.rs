//! Data models for the Club Hub application.
//!
//! Field names are camelCase to match the records the web front end writes
//! into the tree.

mod club;
mod notification;
mod user;

pub use club::*;
pub use notification::*;
pub use user::*;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Current time in the format used for `createdAt` and `date` fields.
///
/// RFC 3339 in UTC at second precision, so plain string ordering of values
/// written by this service is also chronological ordering.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// String form of an id that may be stored as a JSON string or number.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserialize an id stored as either a string or a number. A null id reads
/// as empty.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(String::new());
    }
    id_string(&value).ok_or_else(|| serde::de::Error::custom("expected a string or number id"))
}

/// Deserialize a list the tree may hand back as an array, as an object with
/// index keys, or not at all.
fn tree_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    list_from_tree(value).map_err(serde::de::Error::custom)
}

/// Normalise a stored list into a `Vec`.
///
/// Index-keyed objects are ordered by numeric index; holes are skipped.
pub fn list_from_tree<T: serde::de::DeserializeOwned>(
    value: Value,
) -> Result<Vec<T>, serde_json::Error> {
    let items: Vec<Value> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
        Value::Object(map) => {
            let mut indexed: Vec<(u64, Value)> = map
                .into_iter()
                .map(|(k, v)| (k.parse::<u64>().unwrap_or(u64::MAX), v))
                .collect();
            indexed.sort_by_key(|(i, _)| *i);
            indexed.into_iter().map(|(_, v)| v).collect()
        }
        other => vec![other],
    };
    items.into_iter().map(serde_json::from_value).collect()
}
