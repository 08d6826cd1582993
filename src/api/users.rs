//! User API endpoints, including the per-user admin and notification views.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{error, found, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    Club, CreateUserRequest, MarkedRead, Notification, UnreadCount, UpdateRoleRequest, User,
};
use crate::AppState;

/// Whether a user administers any club.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub is_admin: bool,
}

/// GET /api/users - List all users.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    match state.repo.list_users().await {
        Ok(users) => success(users),
        Err(e) => error(e),
    }
}

/// POST /api/users - Create a user.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<User> {
    if request.email.trim().is_empty() {
        return error(AppError::Validation("Email is required".to_string()));
    }

    match state.repo.create_user(&request).await {
        Ok(user) => success(user),
        Err(e) => error(e),
    }
}

/// GET /api/users/:email - Get a user by email.
pub async fn get_user(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult<User> {
    found(state.repo.get_user_by_email(&email).await, || {
        format!("User {} not found", email)
    })
}

/// PUT /api/users/:email/role - Change a user's role.
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> ApiResult<User> {
    match state.repo.update_user_role(&email, request.role).await {
        Ok(user) => success(user),
        Err(e) => error(e),
    }
}

/// GET /api/users/:email/admin-clubs - Clubs the user administers.
pub async fn list_admin_clubs(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Vec<Club>> {
    match state.repo.list_clubs_by_admin(&email).await {
        Ok(clubs) => success(clubs),
        Err(e) => error(e),
    }
}

/// GET /api/users/:email/is-admin - Whether the user administers any club.
pub async fn get_admin_status(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<AdminStatus> {
    match state.repo.is_club_admin(&email).await {
        Ok(is_admin) => success(AdminStatus { is_admin }),
        Err(e) => error(e),
    }
}

/// GET /api/users/:email/notifications - Notifications, newest first.
pub async fn list_user_notifications(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Vec<Notification>> {
    match state.repo.list_user_notifications(&email).await {
        Ok(notifications) => success(notifications),
        Err(e) => error(e),
    }
}

/// GET /api/users/:email/notifications/unread-count
pub async fn get_unread_count(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<UnreadCount> {
    match state.repo.unread_count(&email).await {
        Ok(unread) => success(UnreadCount { unread }),
        Err(e) => error(e),
    }
}

/// POST /api/users/:email/notifications/read-all
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<MarkedRead> {
    match state.repo.mark_all_notifications_read(&email).await {
        Ok(marked) => success(MarkedRead { marked }),
        Err(e) => error(e),
    }
}
