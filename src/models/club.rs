//! Club model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A club record.
///
/// `key` is the store-generated key the record lives under; `id` is the
/// application identifier. Neither is indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Emails of the club administrators
    #[serde(default, deserialize_with = "super::tree_list")]
    pub club_admins: Vec<String>,
    #[serde(default, deserialize_with = "super::tree_list")]
    pub join_requests: Vec<JoinRequest>,
    #[serde(default, deserialize_with = "super::tree_list")]
    pub questions: Vec<Question>,
    /// Any other fields the front end stores on a club
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Club {
    pub fn is_admin(&self, email: &str) -> bool {
        self.club_admins.iter().any(|admin| admin == email)
    }
}

/// A pending request to join a club.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A question asked to the club administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub email: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for creating a club.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClubRequest {
    /// Application id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub club_admins: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update of a club. Only the fields present are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClubRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club_admins: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_requests: Option<Vec<JoinRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UpdateClubRequest {
    /// Field map for a partial update.
    pub fn into_fields(self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Ok(Map::new()),
        }
    }
}

/// Which list on a club an append targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClubList {
    JoinRequests,
    Questions,
}

impl ClubList {
    /// Field name in the stored record.
    pub fn field(&self) -> &'static str {
        match self {
            ClubList::JoinRequests => "joinRequests",
            ClubList::Questions => "questions",
        }
    }
}
