//! Persistence layer.
//!
//! The auth core talks to storage only through these traits. "Not found" is
//! `Ok(None)` (or `Ok(false)`), never an error; any underlying fault is a
//! [`StoreError`]. Rows are never cached across requests.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{OAuthState, Role, RoleName, Session, Token, TokenType, User, UserState};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (duplicate email, token, role name).
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// A stored row could not be mapped back into a model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Db(#[source] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
        {
            let what = match db.constraint() {
                Some("users_email_key") => "email",
                Some("sessions_token_key") | Some("sessions_pkey") => "session",
                Some("tokens_pkey") => "token",
                Some("roles_name_key") => "role name",
                Some("user_roles_pkey") => "user role",
                _ => "record",
            };
            return StoreError::AlreadyExists(what.to_string());
        }
        StoreError::Db(e)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Lookup key for records addressable by primary id or by secret value.
///
/// Internal callers (CLI, logout) refer to sessions by id while clients
/// authenticate with the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    ById(Uuid),
    ByToken(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Persist profile fields (email, names) and bump `update_at`.
    async fn update_user(&self, user: &User) -> Result<()>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()>;
    async fn set_email_verified(&self, id: Uuid, verified: bool) -> Result<()>;
    async fn set_user_state(&self, id: Uuid, state: UserState) -> Result<()>;
    async fn count_users(&self) -> Result<i64>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<()>;
    /// Raw lookup. Expiry is enforced by the session lifecycle, not here.
    async fn get_session(&self, lookup: &Lookup) -> Result<Option<Session>>;
    async fn delete_session(&self, id: Uuid) -> Result<()>;
    async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<()>;
    /// Delete sessions whose absolute expiry is before `now`; returns rows removed.
    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create_token(&self, token: &Token) -> Result<()>;
    async fn get_token(&self, value: &str) -> Result<Option<Token>>;
    async fn get_tokens_by_email(&self, email: &str, token_type: TokenType) -> Result<Vec<Token>>;
    async fn delete_token(&self, value: &str) -> Result<()>;
    async fn delete_tokens_by_email(&self, email: &str, token_type: TokenType) -> Result<()>;
    /// Delete tokens created before `cutoff`; returns rows removed.
    async fn sweep_tokens_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn create_role(&self, role: &Role) -> Result<()>;
    async fn get_role_by_name(&self, name: RoleName) -> Result<Option<Role>>;
    async fn has_role(&self, user_id: Uuid, name: RoleName) -> Result<bool>;
    async fn add_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()>;
    async fn remove_user_role(&self, user_id: Uuid, role_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait OAuthStateStore: Send + Sync {
    async fn create_oauth_state(&self, state: &OAuthState) -> Result<()>;
    async fn get_oauth_state(&self, lookup: &Lookup) -> Result<Option<OAuthState>>;
    async fn delete_oauth_state(&self, id: Uuid) -> Result<()>;
    async fn sweep_expired_oauth_states(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// The full persistence surface used by the dashboard.
#[async_trait]
pub trait Store: UserStore + SessionStore + TokenStore + RoleStore + OAuthStateStore {
    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<()>;
}

/// Seed the well-known roles and return the number of existing accounts.
/// Safe to call on every start.
pub async fn initialize(store: &dyn Store) -> Result<i64> {
    for name in RoleName::ALL {
        if store.get_role_by_name(name).await?.is_some() {
            continue;
        }
        match store.create_role(&Role::new(name)).await {
            Ok(()) => info!(role = %name, "seeded role"),
            // Another instance seeded it concurrently.
            Err(StoreError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let users = store.count_users().await?;
    info!(users, "store initialized");
    Ok(users)
}
