//! Notification model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A notification addressed to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Store key of the record
    #[serde(default)]
    pub id: String,
    /// Recipient email
    pub to: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub date: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for creating a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub to: String,
    pub message: String,
    /// Sender, club, notification type and the like
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unread notification count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread: usize,
}

/// Result of marking every notification of a user as read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub marked: usize,
}
