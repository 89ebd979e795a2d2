use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ApiResponse;

/// StoreError
///
/// Failures raised by a `Repository` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),
    #[error("A post with id `{0}` already exists")]
    Duplicate(String),
    #[error("Store did not respond within {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Unavailable(String),
}

/// ApiError
///
/// Every failure a handler can produce. Each variant maps to one status code and is
/// rendered as the standard `success: false` envelope, so nothing escapes the
/// handler boundary as a bare status.
#[derive(Debug, Error)]
pub enum ApiError {
    // 404
    #[error("{0}")]
    NotFound(String),
    // 401, no caller context where one is required
    #[error("{0}")]
    Unauthenticated(String),
    // 401, caller present but not permitted
    #[error("{0}")]
    Unauthorized(String),
    // 401, credentials sent but rejected
    #[error("Invalid token")]
    InvalidToken,
    // 400, reported under `errMessage`
    #[error("{0}")]
    Validation(String),
    // 500, or 504 on timeout
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated(_) | ApiError::Unauthorized(_) | ApiError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body: ApiResponse<()> = match &self {
            ApiError::Validation(msg) => ApiResponse::err_message(msg.clone()),
            ApiError::Store(e) => {
                tracing::error!("store error: {:?}", e);
                ApiResponse::message(e.to_string())
            }
            other => ApiResponse::message(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
