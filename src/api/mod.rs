//! REST API module.
//!
//! Thin handlers over the repository and the session store. Every response
//! uses the `{ success, data }` or `{ success, error }` envelope.

mod clubs;
mod notifications;
mod session;
mod users;

pub use clubs::*;
pub use notifications::*;
pub use session::*;
pub use users::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError) -> ApiResult<T> {
    Err(err)
}

/// Turn an optional lookup into data or a 404.
pub fn found<T: Serialize>(
    result: Result<Option<T>, AppError>,
    what: impl FnOnce() -> String,
) -> ApiResult<T> {
    match result {
        Ok(Some(data)) => success(data),
        Ok(None) => error(AppError::NotFound(what())),
        Err(e) => error(e),
    }
}
