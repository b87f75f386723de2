use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the storage layer.
///
/// `AlreadyVoted`, `NotFound` and `DuplicateUsername` are expected domain
/// outcomes; `Db` and `Codec` are infrastructure failures and propagate as 500s.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("User has already voted on this project")]
    AlreadyVoted,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// HTTP-facing error taxonomy. Each variant maps to exactly one status code.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("You have already voted on this project")]
    AlreadyVoted,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::AlreadyVoted => ApiError::AlreadyVoted,
            StorageError::DuplicateUsername => ApiError::DuplicateUsername,
            StorageError::Db(e) => ApiError::Internal(e.to_string()),
            StorageError::Codec(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) | ApiError::AlreadyVoted | ApiError::DuplicateUsername => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let ApiError::Internal(ref detail) = self {
            tracing::error!(%detail, "request failed");
        }

        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
