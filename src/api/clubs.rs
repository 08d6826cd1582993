//! Club API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, found, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Club, CreateClubRequest, JoinRequest, Question, UpdateClubRequest};
use crate::AppState;

/// GET /api/clubs - List all clubs.
pub async fn list_clubs(State(state): State<AppState>) -> ApiResult<Vec<Club>> {
    match state.repo.list_clubs().await {
        Ok(clubs) => success(clubs),
        Err(e) => error(e),
    }
}

/// POST /api/clubs - Create a club.
pub async fn create_club(
    State(state): State<AppState>,
    Json(request): Json<CreateClubRequest>,
) -> ApiResult<Club> {
    if request.name.trim().is_empty() {
        return error(AppError::Validation("Club name is required".to_string()));
    }

    match state.repo.create_club(&request).await {
        Ok(club) => success(club),
        Err(e) => error(e),
    }
}

/// GET /api/clubs/:id - Get a club by its application id.
pub async fn get_club(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Club> {
    found(state.repo.get_club(&id).await, || {
        format!("Club {} not found", id)
    })
}

/// GET /api/clubs/by-name/:name - Get a club by exact name.
pub async fn get_club_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Club> {
    found(state.repo.get_club_by_name(&name).await, || {
        format!("Club named {} not found", name)
    })
}

/// PATCH /api/clubs/:id - Partially update a club.
pub async fn update_club(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateClubRequest>,
) -> ApiResult<Club> {
    match state.repo.update_club(&id, request).await {
        Ok(club) => success(club),
        Err(e) => error(e),
    }
}

/// POST /api/clubs/:id/join-requests - Append a join request.
pub async fn add_join_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<JoinRequest>,
) -> ApiResult<Vec<JoinRequest>> {
    if request.email.trim().is_empty() {
        return error(AppError::Validation(
            "Join request email is required".to_string(),
        ));
    }

    match state.repo.add_join_request(&id, &request).await {
        Ok(requests) => success(requests),
        Err(e) => error(e),
    }
}

/// POST /api/clubs/:id/questions - Append a question.
pub async fn add_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(question): Json<Question>,
) -> ApiResult<Vec<Question>> {
    if question.question.trim().is_empty() {
        return error(AppError::Validation("Question text is required".to_string()));
    }

    match state.repo.add_question(&id, &question).await {
        Ok(questions) => success(questions),
        Err(e) => error(e),
    }
}
