//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dashboard_core::auth::AuthError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Error body. The message is generic; specifics go to the log.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Account locked")]
    Locked,

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.as_str()),
            AppError::InvalidToken => (StatusCode::BAD_REQUEST, "invalid token"),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.as_str()),
            AppError::Locked => (StatusCode::LOCKED, "account is locked"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error"),
        };
        let body = Json(ErrorResponse {
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let detail = e.detail();
        match e {
            AuthError::InvalidPassword(_) | AuthError::InvalidEmail(_) | AuthError::Validation(_) => {
                warn!(error = %detail, "validation failed");
                AppError::Validation(e.to_string())
            }
            AuthError::InvalidCredentials(_) => {
                warn!(error = %detail, "authentication failed");
                AppError::Unauthorized("invalid credentials".into())
            }
            AuthError::InvalidSession(_) => {
                warn!(error = %detail, "invalid session");
                AppError::Unauthorized("invalid session".into())
            }
            AuthError::InvalidToken(_) => {
                warn!(error = %detail, "invalid token");
                AppError::InvalidToken
            }
            AuthError::Conflict(_) => {
                warn!(error = %detail, "conflict");
                AppError::Conflict(e.to_string())
            }
            AuthError::Locked => {
                warn!("attempt to use a locked account");
                AppError::Locked
            }
            AuthError::Forbidden(_) => {
                warn!(error = %detail, "forbidden");
                AppError::Forbidden("forbidden".into())
            }
            AuthError::NotFound(_) => {
                warn!(error = %detail, "not found");
                AppError::NotFound("not found".into())
            }
            AuthError::CorruptToken(_)
            | AuthError::Store(_)
            | AuthError::Mail(_)
            | AuthError::Internal(_) => {
                error!(error = %detail, "request failed");
                AppError::Internal(detail)
            }
        }
    }
}
