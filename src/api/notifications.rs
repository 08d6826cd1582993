//! Notification API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateNotificationRequest, Notification};
use crate::AppState;

/// POST /api/notifications - Send a notification.
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<CreateNotificationRequest>,
) -> ApiResult<Notification> {
    if request.to.trim().is_empty() {
        return error(AppError::Validation("Recipient is required".to_string()));
    }

    match state.repo.create_notification(&request).await {
        Ok(notification) => success(notification),
        Err(e) => error(e),
    }
}

/// POST /api/notifications/:id/read - Mark a notification as read.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Notification> {
    match state.repo.mark_notification_read(&id).await {
        Ok(notification) => success(notification),
        Err(e) => error(e),
    }
}

/// DELETE /api/notifications/:id - Delete a notification.
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    match state.repo.delete_notification(&id).await {
        Ok(()) => success(()),
        Err(e) => error(e),
    }
}
