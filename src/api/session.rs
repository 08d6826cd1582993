//! Local session endpoints.

use axum::{extract::State, Json};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::User;
use crate::AppState;

/// GET /api/session/current-user - The signed-in user, or null.
pub async fn get_current_user(State(state): State<AppState>) -> ApiResult<Option<User>> {
    match state.sessions.current_user().await {
        Ok(user) => success(user),
        Err(e) => error(e),
    }
}

/// PUT /api/session/current-user - Store the signed-in user.
pub async fn set_current_user(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> ApiResult<User> {
    if user.email.trim().is_empty() {
        return error(AppError::Validation("Email is required".to_string()));
    }

    match state.sessions.set_current_user(&user).await {
        Ok(()) => success(user),
        Err(e) => error(e),
    }
}

/// DELETE /api/session/current-user - Sign out.
pub async fn clear_current_user(State(state): State<AppState>) -> ApiResult<()> {
    match state.sessions.clear_current_user().await {
        Ok(()) => success(()),
        Err(e) => error(e),
    }
}
