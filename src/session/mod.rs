//! Local session storage.
//!
//! A string-keyed slot store kept in a local SQLite file, holding the
//! serialized "current user" record among other client-side values. The data
//! access layer only reads the current user; the login flow writes it.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::errors::AppError;
use crate::models::User;

/// Slot holding the signed-in user.
pub const CURRENT_USER_KEY: &str = "currentUser";

/// Key/value session storage.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

/// Open the session database, creating file and table if needed.
pub async fn init_session_db(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS local_storage (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(db_path: &Path) -> Result<Self, AppError> {
        Ok(Self::new(init_session_db(db_path).await?))
    }

    /// Raw value of a slot.
    pub async fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM local_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("value")))
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO local_storage (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM local_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The signed-in user, if any.
    ///
    /// The slot must hold a user record with at least an `email`. Content
    /// that does not parse, or parses to JSON without an `email`, reads as no
    /// user.
    pub async fn current_user(&self) -> Result<Option<User>, AppError> {
        let Some(raw) = self.get_item(CURRENT_USER_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed current user in session storage");
                Ok(None)
            }
        }
    }

    pub async fn set_current_user(&self, user: &User) -> Result<(), AppError> {
        let raw = serde_json::to_string(user)?;
        self.set_item(CURRENT_USER_KEY, &raw).await
    }

    pub async fn clear_current_user(&self) -> Result<(), AppError> {
        self.remove_item(CURRENT_USER_KEY).await
    }
}
