//! Data access repository for clubs, users and notifications.
//!
//! Lookups by application field (club id, club name, user email, recipient)
//! scan the whole collection, so they cost O(n) in the collection size. There
//! are no secondary indexes in the tree.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    list_from_tree, timestamp_now, Club, ClubList, CreateClubRequest, CreateNotificationRequest,
    CreateUserRequest, JoinRequest, Notification, Question, UpdateClubRequest, User, UserRole,
};
use crate::store::{child_path, validate_key, TreeStore};

pub const CLUBS: &str = "clubs";
pub const USERS: &str = "users";
pub const NOTIFICATIONS: &str = "notifications";

/// How many times an array append re-reads and retries after losing a race.
pub const MAX_APPEND_ATTEMPTS: u32 = 5;

/// Repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn TreeStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Fetch a collection and decode each record, paired with its store key.
    async fn fetch_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, T)>, AppError> {
        let value = self.store.get(collection).await?;
        Ok(decode_records(collection, value))
    }

    // ==================== CLUB OPERATIONS ====================

    /// List all clubs.
    pub async fn list_clubs(&self) -> Result<Vec<Club>, AppError> {
        let clubs = self.fetch_collection::<Club>(CLUBS).await?;
        Ok(clubs.into_iter().map(with_club_key).collect())
    }

    /// Find the first club whose `id` equals `id`.
    pub async fn get_club(&self, id: &str) -> Result<Option<Club>, AppError> {
        tracing::debug!(club_id = id, "looking up club by id");
        if id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .fetch_collection::<Club>(CLUBS)
            .await?
            .into_iter()
            .map(with_club_key)
            .find(|club| club.id == id))
    }

    /// Find the first club named exactly `name`.
    pub async fn get_club_by_name(&self, name: &str) -> Result<Option<Club>, AppError> {
        tracing::debug!(name, "looking up club by name");
        Ok(self
            .fetch_collection::<Club>(CLUBS)
            .await?
            .into_iter()
            .map(with_club_key)
            .find(|club| club.name == name))
    }

    /// List the clubs whose admin list contains `email`.
    pub async fn list_clubs_by_admin(&self, email: &str) -> Result<Vec<Club>, AppError> {
        Ok(self
            .fetch_collection::<Club>(CLUBS)
            .await?
            .into_iter()
            .map(with_club_key)
            .filter(|club| club.is_admin(email))
            .collect())
    }

    /// Whether `email` administers at least one club.
    pub async fn is_club_admin(&self, email: &str) -> Result<bool, AppError> {
        Ok(!self.list_clubs_by_admin(email).await?.is_empty())
    }

    /// Create a club. Id uniqueness is not checked.
    pub async fn create_club(&self, request: &CreateClubRequest) -> Result<Club, AppError> {
        let id = request
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut record = to_fields(request)?;
        record.insert("id".to_string(), Value::String(id));
        let mut club: Club = decode_request("club", &record)?;

        let key = self.store.push(CLUBS, &Value::Object(record)).await?;
        tracing::info!(key = %key, "created club");

        club.key = key;
        Ok(club)
    }

    /// Apply a partial update to the club with the given id.
    ///
    /// The fields are merged into the current record first; an update that
    /// would leave a record that no longer reads as a club is rejected
    /// without writing anything. A null field removes it.
    pub async fn update_club(
        &self,
        id: &str,
        request: UpdateClubRequest,
    ) -> Result<Club, AppError> {
        let club = self.require_club(id).await?;
        let fields = request.into_fields()?;
        for field in fields.keys() {
            validate_key(field)?;
        }

        let mut merged = to_fields(&club)?;
        merged.remove("key");
        for (field, value) in &fields {
            if value.is_null() {
                merged.remove(field);
            } else {
                merged.insert(field.clone(), value.clone());
            }
        }
        let mut updated: Club = decode_request("club update", &merged)?;

        let path = child_path(CLUBS, &club.key);
        self.store.update(&path, &fields).await?;
        tracing::info!(club_id = id, fields = fields.len(), "updated club");

        updated.key = club.key;
        Ok(updated)
    }

    /// Append a join request to a club. Returns the resulting list.
    pub async fn add_join_request(
        &self,
        id: &str,
        request: &JoinRequest,
    ) -> Result<Vec<JoinRequest>, AppError> {
        self.append_to_club_list(id, ClubList::JoinRequests, request)
            .await
    }

    /// Append a question to a club. Returns the resulting list.
    pub async fn add_question(
        &self,
        id: &str,
        question: &Question,
    ) -> Result<Vec<Question>, AppError> {
        self.append_to_club_list(id, ClubList::Questions, question)
            .await
    }

    /// Read-append-write guarded by the list's content tag.
    ///
    /// A concurrent writer makes the conditional write fail, in which case the
    /// list is read again and the entry re-appended.
    async fn append_to_club_list<T>(
        &self,
        id: &str,
        list: ClubList,
        entry: &T,
    ) -> Result<Vec<T>, AppError>
    where
        T: Serialize + DeserializeOwned,
    {
        let club = self.require_club(id).await?;
        let path = child_path(&child_path(CLUBS, &club.key), list.field());
        let entry = serde_json::to_value(entry)?;

        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let current = self.store.get_versioned(&path).await?;
            let mut items: Vec<Value> =
                list_from_tree(current.value).map_err(|e| malformed(&path, e))?;
            items.push(entry.clone());
            let items = Value::Array(items);

            if self
                .store
                .set_if_match(&path, &items, &current.etag)
                .await?
            {
                tracing::info!(club_id = id, list = list.field(), attempt, "appended to club list");
                return list_from_tree(items).map_err(|e| malformed(&path, e));
            }
            tracing::debug!(club_id = id, list = list.field(), attempt, "list changed underneath append");
        }

        tracing::warn!(club_id = id, list = list.field(), "append gave up after repeated conflicts");
        Err(AppError::Conflict {
            message: format!(
                "Club {} {} kept changing during append",
                id,
                list.field()
            ),
            attempts: MAX_APPEND_ATTEMPTS,
        })
    }

    async fn require_club(&self, id: &str) -> Result<Club, AppError> {
        self.get_club(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Club {} not found", id)))
    }

    // ==================== USER OPERATIONS ====================

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = self.fetch_collection::<User>(USERS).await?;
        Ok(users.into_iter().map(with_user_key).collect())
    }

    /// Find the first user with the given email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        tracing::debug!(email, "looking up user by email");
        Ok(self
            .fetch_collection::<User>(USERS)
            .await?
            .into_iter()
            .map(with_user_key)
            .find(|user| user.email == email))
    }

    /// Create a user stamped with `createdAt`. Email uniqueness is not checked.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        let mut record = to_fields(request)?;
        record.insert("createdAt".to_string(), Value::String(timestamp_now()));
        let mut user: User = decode_request("user", &record)?;

        let key = self.store.push(USERS, &Value::Object(record)).await?;
        tracing::info!(key = %key, "created user");

        user.key = key;
        Ok(user)
    }

    /// Set the role of the first user with the given email.
    pub async fn update_user_role(&self, email: &str, role: UserRole) -> Result<User, AppError> {
        let mut user = self
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;

        let mut fields = Map::new();
        fields.insert("role".to_string(), Value::String(role.as_str().to_string()));
        self.store
            .update(&child_path(USERS, &user.key), &fields)
            .await?;
        tracing::info!(email, role = role.as_str(), "updated user role");

        user.role = role;
        Ok(user)
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    /// Create an unread notification dated now.
    pub async fn create_notification(
        &self,
        request: &CreateNotificationRequest,
    ) -> Result<Notification, AppError> {
        let mut record = to_fields(request)?;
        record.insert("read".to_string(), Value::Bool(false));
        record.insert("date".to_string(), Value::String(timestamp_now()));
        let mut notification: Notification = decode_request("notification", &record)?;

        let key = self
            .store
            .push(NOTIFICATIONS, &Value::Object(record))
            .await?;
        tracing::info!(key = %key, "created notification");

        notification.id = key;
        Ok(notification)
    }

    /// Notifications addressed to `email`, newest first.
    ///
    /// Ordering is a plain string comparison of `date`, descending. Records
    /// with the same date keep their store order.
    pub async fn list_user_notifications(
        &self,
        email: &str,
    ) -> Result<Vec<Notification>, AppError> {
        let mut notifications: Vec<Notification> = self
            .fetch_collection::<Notification>(NOTIFICATIONS)
            .await?
            .into_iter()
            .map(with_notification_id)
            .filter(|n| n.to == email)
            .collect();
        notifications.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(notifications)
    }

    /// Number of unread notifications addressed to `email`.
    pub async fn unread_count(&self, email: &str) -> Result<usize, AppError> {
        Ok(self
            .list_user_notifications(email)
            .await?
            .iter()
            .filter(|n| !n.read)
            .count())
    }

    /// Mark one notification as read.
    pub async fn mark_notification_read(&self, id: &str) -> Result<Notification, AppError> {
        let (path, mut notification) = self.require_notification(id).await?;

        let mut fields = Map::new();
        fields.insert("read".to_string(), Value::Bool(true));
        self.store.update(&path, &fields).await?;

        notification.read = true;
        Ok(notification)
    }

    /// Mark every unread notification of `email` as read in one write.
    ///
    /// Returns how many notifications changed.
    pub async fn mark_all_notifications_read(&self, email: &str) -> Result<usize, AppError> {
        let fields: Map<String, Value> = self
            .fetch_collection::<Notification>(NOTIFICATIONS)
            .await?
            .into_iter()
            .filter(|(_, n)| n.to == email && !n.read)
            .map(|(key, _)| (format!("{}/read", key), Value::Bool(true)))
            .collect();

        let marked = fields.len();
        if marked > 0 {
            self.store.update(NOTIFICATIONS, &fields).await?;
        }
        tracing::info!(email, marked, "marked notifications read");
        Ok(marked)
    }

    /// Delete a notification.
    pub async fn delete_notification(&self, id: &str) -> Result<(), AppError> {
        let (path, _) = self.require_notification(id).await?;
        self.store.remove(&path).await?;
        tracing::info!(id, "deleted notification");
        Ok(())
    }

    async fn require_notification(&self, id: &str) -> Result<(String, Notification), AppError> {
        let path = child_path(NOTIFICATIONS, validate_key(id)?);
        let value = self.store.get(&path).await?;
        if value.is_null() {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        let mut notification: Notification =
            serde_json::from_value(value).map_err(|e| malformed(&path, e))?;
        notification.id = id.to_string();
        Ok((path, notification))
    }
}

// Helper functions for record conversion

/// Decode the children of a collection node, skipping records that do not
/// fit the model.
fn decode_records<T: DeserializeOwned>(collection: &str, value: Value) -> Vec<(String, T)> {
    let entries: Vec<(String, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => {
            tracing::warn!(collection, value = %other, "collection is not an object");
            Vec::new()
        }
    };

    entries
        .into_iter()
        .filter_map(|(key, record)| match serde_json::from_value::<T>(record) {
            Ok(decoded) => Some((key, decoded)),
            Err(e) => {
                tracing::warn!(collection, key = %key, error = %e, "skipping malformed record");
                None
            }
        })
        .collect()
}

/// Decode a record built from a request before it is written.
fn decode_request<T: DeserializeOwned>(
    what: &str,
    record: &Map<String, Value>,
) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(record.clone()))
        .map_err(|e| AppError::Validation(format!("Invalid {}: {}", what, e)))
}

/// Data read back from the store that does not fit its model.
fn malformed(path: &str, err: serde_json::Error) -> AppError {
    tracing::error!(path, error = %err, "malformed data in store");
    AppError::Store(format!("Malformed data at {}: {}", path, err))
}

fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(AppError::Internal("Record did not serialize to an object".to_string())),
    }
}

fn with_club_key((key, mut club): (String, Club)) -> Club {
    club.key = key;
    club
}

fn with_user_key((key, mut user): (String, User)) -> User {
    user.key = key;
    user
}

fn with_notification_id((key, mut notification): (String, Notification)) -> Notification {
    notification.id = key;
    notification
}
