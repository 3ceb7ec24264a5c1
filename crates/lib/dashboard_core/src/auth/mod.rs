//! Authentication core.
//!
//! Credential rules, the session and one-time-token lifecycles, role checks,
//! OAuth connect state, and the background sweep. Every operation takes the
//! store explicitly; nothing here holds state between calls.

pub mod credential;
pub mod oauth;
pub mod roles;
pub mod sessions;
pub mod sweep;
pub mod tokens;

use std::fmt;

use thiserror::Error;

use crate::mail::MailError;
use crate::models::TokenType;
use crate::store::StoreError;

/// Why a one-time token was refused. Logged, never shown to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    NotFound,
    Expired,
    WrongType { expected: TokenType, actual: TokenType },
    UnknownAccount,
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenRejection::NotFound => f.write_str("token not found"),
            TokenRejection::Expired => f.write_str("token expired"),
            TokenRejection::WrongType { expected, actual } => {
                write!(f, "token type {actual} submitted where {expected} was expected")
            }
            TokenRejection::UnknownAccount => f.write_str("token names an unknown account"),
        }
    }
}

/// Authentication errors.
///
/// `Display` text is safe to show to clients; the payloads carry the concrete
/// reason for the server log.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid password")]
    InvalidPassword(String),

    #[error("invalid email")]
    InvalidEmail(String),

    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials(String),

    #[error("invalid session")]
    InvalidSession(String),

    #[error("invalid token")]
    InvalidToken(TokenRejection),

    #[error("corrupt token")]
    CorruptToken(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("account is locked")]
    Locked,

    #[error("forbidden")]
    Forbidden(String),

    #[error("not found")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(what) => AuthError::Conflict(what),
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    /// The concrete cause, for logging.
    pub fn detail(&self) -> String {
        match self {
            AuthError::InvalidPassword(d)
            | AuthError::InvalidEmail(d)
            | AuthError::Validation(d)
            | AuthError::InvalidCredentials(d)
            | AuthError::InvalidSession(d)
            | AuthError::CorruptToken(d)
            | AuthError::Conflict(d)
            | AuthError::Forbidden(d)
            | AuthError::NotFound(d)
            | AuthError::Internal(d) => d.clone(),
            AuthError::InvalidToken(reason) => reason.to_string(),
            AuthError::Locked => "attempt to use a locked account".into(),
            AuthError::Store(e) => e.to_string(),
            AuthError::Mail(e) => e.to_string(),
        }
    }
}

/// Result type for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
