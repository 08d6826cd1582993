//! User model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a user in the application.
///
/// Stored as a plain string; unknown roles round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserRole {
    #[default]
    Member,
    Admin,
    SuperAdmin,
    Other(String),
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Member => "member",
            UserRole::Admin => "admin",
            UserRole::SuperAdmin => "superadmin",
            UserRole::Other(role) => role,
        }
    }
}

impl From<String> for UserRole {
    fn from(role: String) -> Self {
        match role.as_str() {
            "member" => UserRole::Member,
            "admin" => UserRole::Admin,
            "superadmin" => UserRole::SuperAdmin,
            _ => UserRole::Other(role),
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

/// A user record. `email` is the logical key, by convention only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub created_at: String,
    /// Other profile fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for changing a user's role.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}
